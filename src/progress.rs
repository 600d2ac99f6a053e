use std::time::Duration;

use tokio::sync::mpsc;

const SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Caller-supplied sink for human-readable progress messages.
///
/// Delivery is best-effort: a full channel blocks the pipeline for at most
/// [`SEND_TIMEOUT`] before the message is dropped, and a consumer that went
/// away is ignored. `Progress::none()` only logs.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    tx: Option<mpsc::Sender<String>>,
}

impl Progress {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    pub async fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(%message, "progress");

        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(err) = tx.send_timeout(message, SEND_TIMEOUT).await {
            tracing::debug!(%err, "progress consumer unavailable; message dropped");
        }
    }
}
