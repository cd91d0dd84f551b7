use tracing::info;

/// Outcome of one drain cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_processed: usize,
    pub success_count: usize,
}

impl BatchSummary {
    pub fn failed_count(&self) -> usize {
        self.total_processed - self.success_count
    }

    pub fn message(&self) -> String {
        format!(
            "Processed {} of {} videos",
            self.success_count, self.total_processed
        )
    }
}

/// Receives the one-shot batch-completion signal
pub trait Notifier: Send + Sync {
    fn notify(&self, summary: BatchSummary);
}

/// Writes the batch summary to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, summary: BatchSummary) {
        info!(
            total = summary.total_processed,
            succeeded = summary.success_count,
            "{}",
            summary.message()
        );
    }
}
