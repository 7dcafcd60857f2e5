//! Sync Coordinator: the per-source pipeline and batch execution.

pub mod batch;
pub mod comments;
pub mod coordinator;
pub mod stats;

pub use batch::{format_batch_result, BatchSyncResult, SyncJob};
pub use comments::{format_comment_plan, plan_comment_statements};
pub use coordinator::{
    format_sync_result, SyncCoordinator, SyncOptions, SyncResult, SyncSettings,
};
pub use stats::{format_sync_stats, SyncStats};
