//! klinedump core: archive naming, inventories, coverage planning, materialization.
//!
//! This crate holds everything needed to mirror one ticker's published archives:
//! - Domain types (asset class, data type, frequency, periods, archive refs)
//! - Path/name codec for remote keys and local files
//! - Remote manifest reader and local inventory scanner
//! - Coverage planner (monthly where possible, daily elsewhere)
//! - Fetch-and-materialize executor with atomic writes and monthly fallback
//! - Remote transport behind the `ArchiveSource` trait

pub mod codec;
pub mod domain;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod kline;
pub mod logging;
pub mod manifest;
pub mod planner;
pub mod remote;

pub use error::DumpError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Everything handed to worker threads must be Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::ArchiveRef>();
        require_sync::<domain::ArchiveRef>();
        require_send::<domain::PeriodSet>();
        require_sync::<domain::PeriodSet>();
        require_send::<planner::CoveragePlan>();
        require_sync::<planner::CoveragePlan>();
        require_send::<executor::ExecutionReport>();
        require_sync::<executor::ExecutionReport>();
        require_send::<codec::LocalLayout>();
        require_sync::<codec::LocalLayout>();
        require_send::<remote::VisionSource>();
        require_sync::<remote::VisionSource>();
        require_send::<remote::CircuitBreaker>();
        require_sync::<remote::CircuitBreaker>();
        require_send::<logging::LogContext>();
        require_sync::<logging::LogContext>();
        require_send::<error::DumpError>();
    }

    /// Executors can be built over any source trait object.
    #[test]
    fn executor_accepts_trait_objects() {
        fn _build<'a>(
            source: &'a dyn remote::ArchiveSource,
            layout: &'a codec::LocalLayout,
        ) -> executor::Executor<'a> {
            executor::Executor::new(source, layout).with_progress(&executor::TracingProgress)
        }
    }
}
