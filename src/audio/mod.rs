//! Audio cue module
//!
//! The engine only publishes cue events; this module turns them into
//! sound. Playback never blocks the timer and its failures are dropped.

mod player;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::SessionEvent;

pub use player::{BellPlayer, CommandPlayer, CuePlayer};

/// Feed cue events from the engine into a player until the bus closes
pub async fn run_cue_player(
    player: Arc<dyn CuePlayer>,
    mut event_rx: broadcast::Receiver<SessionEvent>,
) {
    info!("cue player started");

    loop {
        match event_rx.recv().await {
            Ok(SessionEvent::Cue { cue }) => {
                debug!(%cue, "playing cue");
                player.play(cue);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "cue player lagged, cues dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                break;
            }
        }
    }

    info!("cue player stopped");
}
