//! Built-in curation steps.

pub mod database_inclusion;
pub mod database_upload;
pub mod header_filter;
pub mod header_transform;
pub mod make_decoy;
pub mod manual_inclusion;

pub use database_inclusion::DatabaseInclusionStep;
pub use database_upload::DatabaseUploadStep;
pub use header_filter::HeaderFilterStep;
pub use header_transform::HeaderTransformStep;
pub use make_decoy::MakeDecoyStep;
pub use manual_inclusion::ManualInclusionStep;

use crate::executor::RunStatus;

/// Reports per-record progress against the previous step's record count.
pub(crate) fn report_progress(status: &RunStatus, processed: usize, expected: i64, scale: f32, offset: f32) {
    if expected > 0 {
        status.set_current_step_progress(offset + scale * processed as f32 / expected as f32);
    }
}
