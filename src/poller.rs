//! Incremental poller — walks each watched source forward from its
//! persisted cursor, one row at a time.
//!
//! Progress granularity is a single row: the cursor is persisted after
//! every published row, so a crash mid-batch reprocesses at most the
//! in-flight row. Publishing is fire-and-forget relative to the cursor.
//! A fetch failure skips that source for the cycle; the next cycle retries
//! naturally.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::parser::{is_blank_row, parse_row};
use crate::publish::{Notifier, render};
use crate::registry::{SourceDescriptor, SourceRegistry};
use crate::sheets::SheetsApi;
use crate::state::StateStore;

/// Per-source header rows, keyed like the cursor map and refreshed on every
/// fetch. Shared with the decision engine so decision-time re-parses use
/// that source's current column layout, not another source's.
#[derive(Default)]
pub struct HeaderCache {
    headers: RwLock<HashMap<String, Vec<String>>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_key: &str) -> Option<Vec<String>> {
        self.headers
            .read()
            .expect("header lock poisoned")
            .get(source_key)
            .cloned()
    }

    pub fn put(&self, source_key: &str, header: Vec<String>) {
        self.headers
            .write()
            .expect("header lock poisoned")
            .insert(source_key.to_string(), header);
    }
}

/// Drives the source → entry → notification flow.
pub struct Poller {
    registry: Arc<SourceRegistry>,
    sheets: Arc<dyn SheetsApi>,
    notifier: Arc<dyn Notifier>,
    state: Arc<StateStore>,
    headers: Arc<HeaderCache>,
}

impl Poller {
    pub fn new(
        registry: Arc<SourceRegistry>,
        sheets: Arc<dyn SheetsApi>,
        notifier: Arc<dyn Notifier>,
        state: Arc<StateStore>,
        headers: Arc<HeaderCache>,
    ) -> Self {
        Self {
            registry,
            sheets,
            notifier,
            state,
            headers,
        }
    }

    /// Poll every source once. Failures are isolated per source; the cycle
    /// always completes.
    pub async fn poll_all(&self) {
        for (index, source) in self.registry.iter_indexed() {
            if let Err(e) = self.poll_source(index, source).await {
                error!(source = %source.key(), "Polling error: {e}");
            }
        }
    }

    /// Poll one source: fetch header + all data rows, publish everything
    /// past the cursor, advancing and persisting after each row.
    async fn poll_source(&self, index: usize, source: &SourceDescriptor) -> Result<(), Error> {
        let key = source.key();
        let range = format!("{}!A1:ZZ", source.sheet_name);
        let values = self.sheets.get_range(&source.spreadsheet_id, &range).await?;

        let Some((header, data_rows)) = values.split_first() else {
            return Ok(());
        };
        self.headers.put(&key, header.clone());

        let last = self.state.cursor(&key) as usize;
        for (i, row) in data_rows.iter().enumerate().skip(last) {
            if is_blank_row(row) {
                // Blank rows advance the cursor without publishing, so they
                // are not rescanned every cycle.
                self.state.advance_cursor(&key, (i + 1) as u32)?;
                continue;
            }

            let mut entry = parse_row(header, row, &source.type_label);
            entry.type_label = source.type_label.clone();

            // Absolute 1-based row: +1 for the header, +1 for 1-based
            // numbering.
            let row_number = (i + 2) as u32;
            let notification = render(&entry, index, row_number);
            if let Err(e) = self.notifier.publish(&notification).await {
                warn!(source = %key, row = row_number, "Publish failed (not retried): {e}");
            } else {
                debug!(source = %key, row = row_number, "Published application");
            }

            self.state.advance_cursor(&key, (i + 1) as u32)?;
        }

        Ok(())
    }
}

/// Spawn the poll loop: one immediate backlog pass, then one cycle per
/// `poll_interval`, plus on-demand cycles via the returned [`PollTrigger`].
///
/// Returns the task handle, the trigger, and a shutdown flag.
pub fn spawn_poll_loop(
    poller: Arc<Poller>,
    poll_interval: Duration,
) -> (JoinHandle<()>, PollTrigger, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<oneshot::Sender<()>>(8);

    let handle = tokio::spawn(async move {
        info!(
            "Poller started — checking {} source(s) every {}s",
            poller.registry.len(),
            poll_interval.as_secs()
        );

        // First tick fires immediately, covering any backlog since the
        // last run.
        let mut tick = tokio::time::interval(poll_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if shutdown.load(Ordering::Relaxed) {
                        info!("Poller shutting down");
                        return;
                    }
                    poller.poll_all().await;
                }
                Some(ack) = trigger_rx.recv() => {
                    info!("On-demand poll requested");
                    poller.poll_all().await;
                    let _ = ack.send(());
                }
            }
        }
    });

    (handle, PollTrigger { tx: trigger_tx }, shutdown_flag)
}

/// Handle for forcing an immediate poll cycle ("check now").
#[derive(Clone)]
pub struct PollTrigger {
    tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl PollTrigger {
    /// Request a full cycle and wait for it to complete. Returns `false`
    /// if the poll loop is gone.
    pub async fn check_now(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ack_tx).await.is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }
}
