pub mod dates;
pub mod runner;

pub use dates::{date_range, prefix_for_date, prefixes_for, sync_window};
pub use runner::{run, IngestPipeline, RunError, RunOutcome, RunSummary};
