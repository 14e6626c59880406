pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod reader;
pub mod reconstruct;
pub mod scanner;

pub use cache::{FetchOutcome, JobCache, JobSnapshot, ScanStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::IndexerConfig;
pub use error::{PartialScanError, ReadError};
pub use reader::EscrowReader;
pub use reconstruct::{Hydrated, Reconstructor};
pub use scanner::{LogScanner, Progress, Window};
