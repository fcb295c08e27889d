//! Pass results

use super::executor::PassTally;
use super::queue::UploadQueue;
use serde::Serialize;

/// What a finished pass hands back to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// URL of every uploaded item in the queue, including earlier passes
    pub successful_urls: Vec<String>,
    pub succeeded: usize,
    pub attempted: usize,
    pub failed: usize,
    pub abandoned: usize,
}

impl PassReport {
    /// Combine the queue's uploaded items with this pass's counts
    pub fn collect(queue: &UploadQueue, tally: PassTally) -> Self {
        Self {
            successful_urls: queue.uploaded_urls(),
            succeeded: tally.succeeded,
            attempted: tally.attempted,
            failed: tally.failed,
            abandoned: tally.abandoned,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.attempted
    }

    /// One-line notification text
    pub fn summary(&self) -> String {
        format!(
            "{} of {} file(s) uploaded successfully",
            self.succeeded, self.attempted
        )
    }
}
