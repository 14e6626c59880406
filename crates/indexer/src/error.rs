use alloy::primitives::U256;
use contract_client::ChainError;

use crate::scanner::Window;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReadError {
    #[error("chain read failed: {0}")]
    ChainRead(#[from] ChainError),
}

/// Windows and ids lost during one aggregation pass. The pass still returns
/// whatever it could read; this value is only ever logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error(
    "partial scan: {} window(s) and {} id(s) skipped",
    .failed_windows.len(),
    .dropped_ids.len()
)]
pub struct PartialScanError {
    pub failed_windows: Vec<Window>,
    pub dropped_ids: Vec<U256>,
}

impl PartialScanError {
    pub fn is_empty(&self) -> bool {
        self.failed_windows.is_empty() && self.dropped_ids.is_empty()
    }

    pub fn merge(&mut self, other: PartialScanError) {
        self.failed_windows.extend(other.failed_windows);
        self.dropped_ids.extend(other.dropped_ids);
    }

    pub fn log(&self, operation: &'static str) {
        if self.is_empty() {
            return;
        }
        tracing::warn!(
            operation,
            windows = ?self.failed_windows,
            ids = ?self.dropped_ids,
            "{self}"
        );
    }
}
