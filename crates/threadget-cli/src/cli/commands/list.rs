//! `threadget list <url>` – show what `get` would download.

use anyhow::{Context, Result};
use threadget_core::config::ThreadgetConfig;
use threadget_core::scheduler::format_bytes;
use threadget_core::thread::{fetch_thread_json, Thread, ThreadUrl};
use threadget_core::url_model::assign_unique_names;

pub async fn run_list(cfg: &ThreadgetConfig, url: &str) -> Result<()> {
    let thread_url = ThreadUrl::parse(url)?;
    let raw = fetch_thread_json(&thread_url, &cfg.api_base_url, &cfg.http_options())
        .await
        .with_context(|| format!("fetch thread {}", thread_url))?;
    let thread = Thread::from_json(thread_url, &raw)?;
    let descriptors = assign_unique_names(thread.descriptors(&cfg.media_base_url));

    println!("{}", thread.dir_name());
    if descriptors.is_empty() {
        println!("No files in thread.");
        return Ok(());
    }
    println!("{:<10} {:<48} {}", "SIZE", "NAME", "URL");
    let mut total = 0u64;
    for d in &descriptors {
        let size = d
            .expected_size()
            .map(|s| {
                total += s;
                format_bytes(s)
            })
            .unwrap_or_else(|| "-".to_string());
        println!("{:<10} {:<48} {}", size, d.target_name(), d.source_url());
    }
    println!("{} files, {}", descriptors.len(), format_bytes(total));
    Ok(())
}
