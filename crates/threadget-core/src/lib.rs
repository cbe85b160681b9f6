pub mod config;
pub mod logging;

pub mod checksum;
pub mod control;
pub mod descriptor;
pub mod downloader;
pub mod existence;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod thread;
pub mod url_model;

pub use descriptor::Descriptor;
