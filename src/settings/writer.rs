//! Background settings persistence
//!
//! Saves are queued and written in order by a single task. Callers never
//! wait on a save; only shutdown waits, via `flush`.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::model::Settings;
use super::store::SettingsStore;

enum WriterMessage {
    Save(Settings),
    Flush(oneshot::Sender<()>),
}

/// Handle for queueing settings saves
#[derive(Debug, Clone)]
pub struct SettingsWriter {
    tx: mpsc::UnboundedSender<WriterMessage>,
}

impl std::fmt::Debug for WriterMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterMessage::Save(settings) => write!(f, "Save({:?})", settings),
            WriterMessage::Flush(_) => write!(f, "Flush"),
        }
    }
}

impl SettingsWriter {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: SettingsStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(store, rx));
        Self { tx }
    }

    /// Queue a save; failures are logged by the writer task
    pub fn persist(&self, settings: Settings) {
        if self.tx.send(WriterMessage::Save(settings)).is_err() {
            warn!("settings writer stopped, change kept in memory only");
        }
    }

    /// Wait until every save queued so far has been attempted
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriterMessage::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn run_writer(store: SettingsStore, mut rx: mpsc::UnboundedReceiver<WriterMessage>) {
    debug!(path = ?store.path(), "settings writer started");

    while let Some(message) = rx.recv().await {
        match message {
            WriterMessage::Save(settings) => {
                let store = store.clone();
                match tokio::task::spawn_blocking(move || store.save(&settings)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "failed to persist settings"),
                    Err(e) => warn!(error = %e, "settings save task failed"),
                }
            }
            WriterMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("settings writer stopped");
}
