//! Batch partitioning for staged dispatch

use crate::job::Job;

/// A contiguous slice of the dispatch, sent as one concurrent wave.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Zero-based position within the dispatch.
    pub index: usize,
    /// Jobs in original recipient order.
    pub jobs: Vec<Job>,
}

impl Batch {
    /// Number of jobs in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the batch holds no jobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Split `jobs` into consecutive batches of at most `batch_size`.
///
/// Order is preserved: job `k` of the dispatch lands in batch
/// `k / batch_size`. The final batch holds the remainder and may be
/// smaller. A `batch_size` of zero is treated as one to keep the
/// partition total.
#[must_use]
pub(crate) fn partition(jobs: Vec<Job>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(jobs.len().div_ceil(batch_size));
    let mut jobs = jobs.into_iter();

    loop {
        let chunk: Vec<Job> = jobs.by_ref().take(batch_size).collect();
        if chunk.is_empty() {
            break;
        }
        batches.push(Batch {
            index: batches.len(),
            jobs: chunk,
        });
    }

    batches
}
