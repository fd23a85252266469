//! Periodic reconciliation watchers and their scheduler.
//!
//! Each watcher owns one sync loop: sleep the interval, then run one
//! reconciliation pass. Loops sleep first so process startup does not
//! stampede the kernel with every table scan at once. A failed or panicking
//! pass is logged and the loop keeps ticking; watchers only stop at process
//! exit.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::Result;

/// A periodic reconciliation worker.
///
/// Implementations compare one kernel table against desired state from
/// metadata and repair drift. A single `sync` call must be idempotent:
/// run twice on unchanged inputs, the second pass performs no mutations.
#[async_trait]
pub trait Watcher: Send + 'static {
    /// Short name used in log messages (e.g. "arpsync").
    fn name(&self) -> &'static str;

    /// Runs one reconciliation pass.
    ///
    /// Step-level failures return `Err` and abort the pass; the loop retries
    /// on its next tick. Entry-level failures must be handled inside, so one
    /// bad entry never hides the rest of the table.
    async fn sync(&mut self) -> Result<()>;
}

/// Parses a sync-interval override string.
///
/// Empty or unparsable strings silently fall back to the given per-watcher
/// default, matching the command-line contract: `--arpsync-interval ""` and
/// `--arpsync-interval abc` both mean "use the default".
pub fn parse_sync_interval(raw: &str, default_secs: u64) -> Duration {
    let secs = raw.parse::<u64>().unwrap_or(default_secs);
    Duration::from_secs(secs)
}

/// Spawns the sync loop for a watcher.
///
/// The loop runs until the process exits. A panic inside a reconciliation
/// pass is caught and logged; the loop continues on its next tick.
pub fn spawn_watcher<W: Watcher>(mut watcher: W, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = watcher.name();
        info!(
            watcher = name,
            interval_secs = interval.as_secs(),
            "starting sync loop"
        );

        loop {
            tokio::time::sleep(interval).await;
            debug!(watcher = name, "time to sync");

            match AssertUnwindSafe(watcher.sync()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(watcher = name, error = %err, "while syncing, got error");
                }
                Err(panic) => {
                    error!(
                        watcher = name,
                        panic = panic_message(&panic),
                        "sync pass panicked, continuing on next tick"
                    );
                }
            }
        }
    })
}

fn panic_message(panic: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
