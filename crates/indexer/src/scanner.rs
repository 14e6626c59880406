//! Block-range pagination for `eth_getLogs`.
//!
//! Providers cap the span of a single log query, so a scan over `[from, to]`
//! is split into consecutive windows queried one after another. A failing
//! window is logged and skipped; the rest of the scan continues.

use std::pin::pin;
use std::sync::Arc;

use contract_client::{EscrowChain, EventFilter, EventLog};
use futures::{stream, Stream, StreamExt};
use tokio::sync::watch;

/// Inclusive block range queried in one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: u64,
    pub to: u64,
}

/// Consecutive non-overlapping windows of at most `size` blocks covering
/// `[from, to]`. Empty when `from > to`.
pub fn split_range(from: u64, to: u64, size: u64) -> Vec<Window> {
    let size = size.max(1);
    let mut windows = Vec::new();
    if from > to {
        return windows;
    }

    let mut start = from;
    loop {
        let end = start.saturating_add(size - 1).min(to);
        windows.push(Window { from: start, to: end });
        if end >= to {
            break;
        }
        start = end + 1;
    }

    windows
}

/// First block of a bounded-lookback scan.
pub fn lookback_start(head: u64, lookback: u64) -> u64 {
    head.saturating_sub(lookback)
}

/// Latest human-readable scan status. Advisory only.
#[derive(Debug, Clone)]
pub struct Progress {
    tx: Arc<watch::Sender<String>>,
}

impl Default for Progress {
    fn default() -> Self {
        let (tx, _) = watch::channel(String::new());
        Self { tx: Arc::new(tx) }
    }
}

impl Progress {
    pub fn set(&self, message: impl Into<String>) {
        self.tx.send_replace(message.into());
    }

    pub fn clear(&self) {
        self.tx.send_replace(String::new());
    }

    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }
}

/// Result of querying one window.
#[derive(Debug, Clone)]
pub struct WindowBatch {
    pub window: Window,
    pub logs: Vec<EventLog>,
    pub failed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub logs: Vec<EventLog>,
    pub failed: Vec<Window>,
}

pub struct LogScanner<C> {
    chain: Arc<C>,
    window_size: u64,
    progress: Progress,
}

impl<C: EscrowChain> LogScanner<C> {
    pub fn new(chain: Arc<C>, window_size: u64, progress: Progress) -> Self {
        Self {
            chain,
            window_size: window_size.max(1),
            progress,
        }
    }

    /// Windows of `[from, to]` queried sequentially, yielded in chronological
    /// order as each one completes.
    pub fn windows<'a>(
        &'a self,
        filter: &'a EventFilter,
        from: u64,
        to: u64,
    ) -> impl Stream<Item = WindowBatch> + 'a {
        let pending = split_range(from, to, self.window_size).into_iter();

        stream::unfold((pending, 0usize), move |(mut pending, found)| async move {
            let window = pending.next()?;
            let batch = self.query(filter, window).await;
            let found = found + batch.logs.len();

            self.progress.set(format!(
                "Scanned blocks {} to {} of {}: {} {} event(s) found",
                window.from,
                window.to,
                to,
                found,
                filter.event.name()
            ));

            Some((batch, (pending, found)))
        })
    }

    /// Whole-range scan, concatenating successful windows.
    pub async fn scan(&self, filter: &EventFilter, from: u64, to: u64) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut batches = pin!(self.windows(filter, from, to));

        while let Some(batch) = batches.next().await {
            if batch.failed {
                outcome.failed.push(batch.window);
            } else {
                outcome.logs.extend(batch.logs);
            }
        }

        outcome
    }

    async fn query(&self, filter: &EventFilter, window: Window) -> WindowBatch {
        match self.chain.logs(filter, window.from, window.to).await {
            Ok(logs) => {
                tracing::debug!(
                    event = filter.event.name(),
                    from = window.from,
                    to = window.to,
                    count = logs.len(),
                    "log window scanned"
                );
                WindowBatch {
                    window,
                    logs,
                    failed: false,
                }
            }
            Err(e) => {
                tracing::warn!(
                    event = filter.event.name(),
                    from = window.from,
                    to = window.to,
                    error = %e,
                    "log window failed, skipping"
                );
                WindowBatch {
                    window,
                    logs: Vec::new(),
                    failed: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use contract_client::mock::{job_record, MockChain};
    use contract_client::EscrowEvent;

    #[test]
    fn windows_are_contiguous_and_clipped() {
        let windows = split_range(1_000, 1_900, 400);
        assert_eq!(
            windows,
            vec![
                Window { from: 1_000, to: 1_399 },
                Window { from: 1_400, to: 1_799 },
                Window { from: 1_800, to: 1_900 },
            ]
        );
    }

    #[test]
    fn single_block_and_empty_ranges() {
        assert_eq!(split_range(7, 7, 400), vec![Window { from: 7, to: 7 }]);
        assert!(split_range(8, 7, 400).is_empty());
    }

    #[test]
    fn range_ending_at_u64_max_terminates() {
        let windows = split_range(u64::MAX - 5, u64::MAX, 4);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].to, u64::MAX);
    }

    #[test]
    fn lookback_never_goes_below_genesis() {
        assert_eq!(lookback_start(100, 150_000), 0);
        assert_eq!(lookback_start(200_000, 150_000), 50_000);
    }

    fn chain_with_jobs(blocks: &[u64]) -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new().with_head(2_000));
        for (i, block) in blocks.iter().enumerate() {
            let record = job_record(Address::repeat_byte(0x01), "job", U256::from(1u64));
            chain.add_job(i as u64 + 1, record, *block);
        }
        chain
    }

    #[tokio::test]
    async fn windowed_scan_equals_unbounded_query() {
        let chain = chain_with_jobs(&[5, 399, 400, 401, 1_234, 1_999]);
        let filter = EventFilter::new(EscrowEvent::JobCreated);

        let unbounded = chain.logs(&filter, 0, 2_000).await.unwrap();
        let scanner = LogScanner::new(chain.clone(), 400, Progress::default());
        let outcome = scanner.scan(&filter, 0, 2_000).await;

        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.logs, unbounded);
    }

    #[tokio::test]
    async fn failed_window_is_skipped_not_fatal() {
        let chain = chain_with_jobs(&[10, 500, 900]);
        chain.fail_logs_at(450);
        let filter = EventFilter::new(EscrowEvent::JobCreated);
        let scanner = LogScanner::new(chain.clone(), 400, Progress::default());

        let outcome = scanner.scan(&filter, 0, 1_000).await;

        assert_eq!(outcome.failed, vec![Window { from: 400, to: 799 }]);
        let blocks: Vec<_> = outcome.logs.iter().filter_map(|l| l.block_number).collect();
        assert_eq!(blocks, vec![10, 900]);
        assert_eq!(chain.log_queries().len(), 3);
    }

    #[tokio::test]
    async fn progress_reports_running_totals() {
        let chain = chain_with_jobs(&[10, 20, 900]);
        let filter = EventFilter::new(EscrowEvent::JobCreated);
        let progress = Progress::default();
        let scanner = LogScanner::new(chain.clone(), 400, progress.clone());

        scanner.scan(&filter, 0, 1_000).await;

        assert_eq!(
            progress.current(),
            "Scanned blocks 800 to 1000 of 1000: 3 JobCreated event(s) found"
        );
    }

    #[tokio::test]
    async fn account_filter_is_passed_through() {
        let chain = Arc::new(MockChain::new().with_head(100));
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);
        chain.add_job(1, job_record(alice, "a", U256::from(1u64)), 10);
        chain.add_job(2, job_record(bob, "b", U256::from(1u64)), 11);

        let scanner = LogScanner::new(chain.clone(), 400, Progress::default());
        let filter = EventFilter::new(EscrowEvent::JobCreated).by_account(bob);
        let outcome = scanner.scan(&filter, 0, 100).await;

        assert_eq!(outcome.logs.len(), 1);
        assert_eq!(outcome.logs[0].account, bob);
    }
}
