//! Single-use completion signal from producer to consumer
//!
//! The notifier is consumed when fired, so publishing can only be marked done
//! once. Dropping it unfired tells the consumer the producer gave up.

use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub run_id: Uuid,
    /// Records enqueued, end-of-stream marker excluded
    pub published: u64,
}

pub struct CompletionNotifier {
    sender: oneshot::Sender<PublishReport>,
}

pub struct CompletionWatch {
    receiver: oneshot::Receiver<PublishReport>,
}

pub fn channel() -> (CompletionNotifier, CompletionWatch) {
    let (sender, receiver) = oneshot::channel();
    (CompletionNotifier { sender }, CompletionWatch { receiver })
}

impl CompletionNotifier {
    pub fn notify(self, report: PublishReport) {
        if self.sender.send(report).is_err() {
            debug!("Consumer no longer watching for completion");
        }
    }
}

impl CompletionWatch {
    /// Resolves once: `Some` when publishing finished, `None` if the producer
    /// stopped without finishing. Cancel-safe; must not be awaited again
    /// after it resolved.
    pub async fn wait(&mut self) -> Option<PublishReport> {
        (&mut self.receiver).await.ok()
    }
}
