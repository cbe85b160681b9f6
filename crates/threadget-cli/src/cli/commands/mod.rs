//! CLI command handlers, one per file.

mod completions;
mod get;
mod list;
mod progress;

pub use completions::run_completions;
pub use get::run_get;
pub use list::run_list;
