pub mod enums;
pub mod format;
pub mod ids;
pub mod job;
