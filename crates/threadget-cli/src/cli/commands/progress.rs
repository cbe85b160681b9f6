//! Progress line printer for `threadget get`.

use std::io::Write;
use std::time::{Duration, Instant};
use threadget_core::scheduler::{format_bytes, ProgressEvent, ProgressKind, ProgressTally};
use tokio::sync::mpsc::UnboundedReceiver;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Folds events into `tally` and redraws one stderr line at most every
/// 500 ms. Returns when every sender is gone.
pub async fn print_progress(
    mut rx: UnboundedReceiver<ProgressEvent>,
    mut tally: ProgressTally,
) -> ProgressTally {
    let mut last_print: Option<Instant> = None;
    while let Some(event) = rx.recv().await {
        tally.apply(&event);
        if let ProgressKind::Failed(kind, message) = &event.kind {
            tracing::debug!(file = %event.target_name, %kind, %message, "progress: failed");
        }
        let due = last_print.map_or(true, |t| t.elapsed() >= PROGRESS_INTERVAL);
        if due || tally.files_done() == tally.files_total {
            draw(&tally);
            last_print = Some(Instant::now());
        }
    }
    if last_print.is_some() {
        eprintln!();
    }
    tally
}

fn draw(tally: &ProgressTally) {
    let expected = if tally.bytes_expected > 0 {
        format!(" / {}", format_bytes(tally.bytes_expected))
    } else {
        String::new()
    };
    let line = format!(
        "\r  {}/{} files ({:.0}%)  {}{}  {}/s  {} active  ",
        tally.files_done(),
        tally.files_total,
        tally.fraction() * 100.0,
        format_bytes(tally.bytes_done),
        expected,
        format_bytes(tally.bytes_per_sec() as u64),
        tally.fetching,
    );
    let mut err = std::io::stderr().lock();
    let _ = err.write_all(line.as_bytes());
    let _ = err.flush();
}
