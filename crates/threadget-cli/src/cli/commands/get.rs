//! `threadget get <url>` – download every file of a thread.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use threadget_core::config::ThreadgetConfig;
use threadget_core::control::CancelToken;
use threadget_core::scheduler::{self, FetchLimiter, ProgressTally, RunOptions};
use threadget_core::thread::{fetch_thread_json, save_thread_json, Thread, ThreadUrl};

use super::progress::print_progress;

/// Returns whether every file ended up on disk (downloaded or already present).
pub async fn run_get(
    cfg: &ThreadgetConfig,
    url: &str,
    output_dir: &Path,
    concurrency: Option<usize>,
    flat: bool,
    verify_md5: bool,
) -> Result<bool> {
    let thread_url = ThreadUrl::parse(url)?;
    let http = cfg.http_options();
    let raw = fetch_thread_json(&thread_url, &cfg.api_base_url, &http)
        .await
        .with_context(|| format!("fetch thread {}", thread_url))?;
    let thread = Thread::from_json(thread_url, &raw)?;
    let descriptors = thread.descriptors(&cfg.media_base_url);

    let target_dir = if flat {
        output_dir.to_path_buf()
    } else {
        output_dir.join(thread.dir_name())
    };
    tokio::fs::create_dir_all(&target_dir)
        .await
        .with_context(|| format!("create {}", target_dir.display()))?;
    save_thread_json(&thread, &target_dir)
        .with_context(|| format!("save thread.json in {}", target_dir.display()))?;

    let concurrency = concurrency.unwrap_or(cfg.concurrency);
    println!(
        "{}: {} files -> {}",
        thread.url(),
        descriptors.len(),
        target_dir.display()
    );
    tracing::info!(thread = %thread.url(), files = descriptors.len(), concurrency, "get");

    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if await_force_quit(tokio::signal::ctrl_c, cancel).await {
                eprintln!("\ninterrupted again, exiting without waiting");
                std::process::exit(130);
            }
        })
    };

    let bytes_expected = descriptors.iter().filter_map(|d| d.expected_size()).sum();
    let tally = ProgressTally::new(descriptors.len(), bytes_expected);
    let (progress_tx, progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(progress_rx, tally));

    let mut opts = RunOptions::from_config(cfg);
    opts.verify_md5 |= verify_md5;
    let result = scheduler::run_downloads(
        descriptors,
        &target_dir,
        &opts,
        Arc::new(FetchLimiter::new(concurrency)),
        Some(progress_tx),
        &cancel,
    )
    .await;
    ctrl_c.abort();
    // Only an attempt that outlived the run's settle limit still holds a sender.
    let _ = tokio::time::timeout(Duration::from_secs(2), printer).await;
    let report = result?;

    println!("{}", report.summary_line());
    for failure in &report.failures {
        eprintln!("  failed: {}", failure);
    }
    if cancel.is_cancelled() {
        println!("Run was cancelled.");
    }
    Ok(report.is_success())
}

/// Listens for interrupts: the first cancels the run, the second resolves to
/// `true` so the caller can quit at once. Resolves to `false` if listening
/// fails.
async fn await_force_quit<F, Fut>(mut next_interrupt: F, cancel: CancelToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    while next_interrupt().await.is_ok() {
        if cancel.is_cancelled() {
            return true;
        }
        eprintln!("\ncancelling, waiting for in-flight downloads (Ctrl-C again to quit)...");
        cancel.cancel();
    }
    false
}
