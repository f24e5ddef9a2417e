//! Cue player implementations
//!
//! Players are fire-and-forget: `play` returns immediately and never
//! reports failure to the caller.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::events::Cue;

/// Plays named cues
pub trait CuePlayer: Send + Sync {
    /// Start playing `cue`, cutting off any cue still sounding
    fn play(&self, cue: Cue);
}

/// Rings the terminal bell on stderr
#[derive(Debug, Default)]
pub struct BellPlayer;

impl CuePlayer for BellPlayer {
    fn play(&self, cue: Cue) {
        let bell: &[u8] = match cue {
            Cue::Done => b"\x07\x07",
            _ => b"\x07",
        };

        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(bell).and_then(|_| stderr.flush()) {
            debug!(error = %e, %cue, "bell failed");
        }
    }
}

/// Runs an external program with the cue's sound file as last argument
///
/// `<program> [args...] <sound_dir>/<cue-name>.wav`
#[derive(Debug)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    sound_dir: PathBuf,
    current: Mutex<Option<Child>>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>, sound_dir: &Path) -> Self {
        Self {
            program: program.into(),
            args,
            sound_dir: sound_dir.to_path_buf(),
            current: Mutex::new(None),
        }
    }

    /// Build from a whitespace-separated command line such as `"aplay -q"`
    pub fn from_command_line(command_line: &str, sound_dir: &Path) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), sound_dir))
    }

    /// Sound file for a cue
    pub fn sound_path(&self, cue: Cue) -> PathBuf {
        self.sound_dir.join(format!("{}.wav", cue.name()))
    }
}

impl CuePlayer for CommandPlayer {
    fn play(&self, cue: Cue) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        // Stop-then-restart so consecutive cues never overlap
        if let Some(mut previous) = current.take() {
            if let Err(e) = previous.start_kill() {
                debug!(error = %e, "previous cue already finished");
            }
        }

        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg(self.sound_path(cue))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(child) => {
                debug!(%cue, pid = ?child.id(), "cue playing");
                *current = Some(child);
            }
            Err(e) => {
                warn!(%cue, program = %self.program, error = %e, "failed to play cue");
            }
        }
    }
}
