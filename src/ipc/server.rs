//! Unix domain socket server for IPC
//!
//! Provides request-response commands and push notifications of engine
//! events to subscribed clients.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::events::SessionEvent;

use super::protocol::{Notification, Request, Response, MAX_MESSAGE_LEN};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    engine: Engine,
    shutdown_tx: broadcast::Sender<()>,
}

/// Messages queued for a client's writer
enum Outbound {
    Response(Response),
    /// Start forwarding events from this receiver
    Subscribe(broadcast::Receiver<SessionEvent>),
}

impl Server {
    /// Bind the socket, replacing a stale one
    pub fn bind(socket_path: &Path, engine: Engine) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path)
            .context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            engine,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let engine = self.engine.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, engine) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Handle a single client connection
///
/// Reads requests on the caller's task; a separate writer task sends
/// responses and, once subscribed, event notifications in order.
async fn handle_client(stream: UnixStream, engine: Engine) -> Result<()> {
    let (mut reader, writer) = stream.into_split();
    let (out_tx, out_rx) = mpsc::channel(32);
    let writer_task = tokio::spawn(write_loop(writer, out_rx));

    let result = read_loop(&mut reader, &engine, &out_tx).await;

    drop(out_tx);
    match writer_task.await {
        Ok(Err(e)) => debug!(?e, "client writer stopped"),
        Err(e) => debug!(?e, "client writer task failed"),
        Ok(Ok(())) => {}
    }

    result
}

async fn read_loop<R>(reader: &mut R, engine: &Engine, out_tx: &mpsc::Sender<Outbound>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let body = match read_message(reader).await? {
            Some(body) => body,
            None => {
                debug!("client disconnected");
                return Ok(());
            }
        };

        let response = match serde_json::from_slice::<Request>(&body) {
            Ok(request) => {
                debug!(?request, "received request");
                if request == Request::Subscribe {
                    if out_tx.send(Outbound::Subscribe(engine.subscribe())).await.is_err() {
                        return Ok(());
                    }
                    debug!("client subscribed to notifications");
                }
                process_request(request, engine)
            }
            Err(e) => {
                warn!(error = %e, "failed to parse request");
                Response::error("bad_request", e.to_string())
            }
        };

        if out_tx.send(Outbound::Response(response)).await.is_err() {
            return Ok(());
        }
    }
}

async fn write_loop<W>(mut writer: W, mut out_rx: mpsc::Receiver<Outbound>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut event_rx: Option<broadcast::Receiver<SessionEvent>> = None;

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(Outbound::Response(response)) => send_message(&mut writer, &response).await?,
                Some(Outbound::Subscribe(rx)) => event_rx = Some(rx),
                None => return Ok(()),
            },
            event = next_event(&mut event_rx) => match event {
                Ok(event) => send_message(&mut writer, &Notification::Event { event }).await?,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => event_rx = None,
            },
        }
    }
}

/// Next event for a subscribed client; never resolves when unsubscribed
async fn next_event(
    event_rx: &mut Option<broadcast::Receiver<SessionEvent>>,
) -> Result<SessionEvent, broadcast::error::RecvError> {
    match event_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Read one length-prefixed message; `None` on clean disconnect
async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        anyhow::bail!("message too large ({} bytes)", len);
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;
    writer.flush().await?;

    Ok(())
}

/// Apply a request to the engine
fn process_request(request: Request, engine: &Engine) -> Response {
    let outcome = match request {
        Request::Ping => return Response::Pong,
        Request::Subscribe => return Response::Subscribed,
        Request::GetStatus => return Response::Status(engine.status()),
        Request::GetSettings => {
            return Response::Settings {
                settings: engine.settings(),
                notice: None,
            }
        }
        Request::Start => return Response::Status(engine.start()),
        Request::Pause => return Response::Status(engine.pause()),
        Request::Reset => return Response::Status(engine.reset()),
        Request::SetWorkSeconds { seconds } => engine.set_work_seconds(seconds),
        Request::SetRestSeconds { seconds } => engine.set_rest_seconds(seconds),
        Request::SetTotalSets { sets } => engine.set_total_sets(sets),
        Request::SetPrepEnabled { enabled } => engine.set_prep_enabled(enabled),
    };

    match outcome {
        Ok(change) => Response::Settings {
            settings: change.settings,
            notice: change.notice(),
        },
        Err(e) => {
            info!(code = e.code(), "settings change rejected");
            Response::rejected(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::events::Cue;
    use crate::settings::{Settings, SettingsStore, SettingsWriter};
    use crate::state::Phase;

    struct Fixture {
        _temp: TempDir,
        socket_path: PathBuf,
        engine: Engine,
    }

    fn spawn_server() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(&temp.path().join("settings.json"));
        let engine = Engine::new(
            Settings {
                work_seconds: 2,
                rest_seconds: 1,
                total_sets: 1,
                prep_enabled: false,
            },
            SettingsWriter::spawn(store),
        );
        let socket_path = temp.path().join("timer.sock");
        let server = Server::bind(&socket_path, engine.clone()).unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Fixture {
            _temp: temp,
            socket_path,
            engine,
        }
    }

    async fn request(stream: &mut UnixStream, request: &Request) -> Response {
        send_message(stream, request).await.unwrap();
        let body = read_message(stream).await.unwrap().unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let fixture = spawn_server();
        let mut stream = UnixStream::connect(&fixture.socket_path).await.unwrap();

        assert_eq!(request(&mut stream, &Request::Ping).await, Response::Pong);

        match request(&mut stream, &Request::GetStatus).await {
            Response::Status(status) => {
                assert_eq!(status.phase, Phase::Idle);
                assert_eq!(status.clock, "00:02");
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_settings_commands() {
        let fixture = spawn_server();
        let mut stream = UnixStream::connect(&fixture.socket_path).await.unwrap();

        request(&mut stream, &Request::SetWorkSeconds { seconds: 300 }).await;
        request(&mut stream, &Request::SetRestSeconds { seconds: 300 }).await;
        let resp = request(&mut stream, &Request::SetTotalSets { sets: 20 }).await;
        match resp {
            Response::Settings { settings, notice } => {
                assert_eq!(settings.total_sets, 18);
                assert!(notice.unwrap().contains("18"));
            }
            other => panic!("unexpected response: {:?}", other),
        }

        let resp = request(&mut stream, &Request::SetWorkSeconds { seconds: 0 }).await;
        assert!(matches!(resp, Response::Rejected { ref code, .. } if code == "out_of_range"));

        request(&mut stream, &Request::Start).await;
        let resp = request(&mut stream, &Request::SetPrepEnabled { enabled: true }).await;
        assert_eq!(
            resp,
            Response::Rejected {
                code: "settings_locked".into(),
                message: "stop and reset to change settings".into(),
            }
        );
        assert_eq!(fixture.engine.settings().work_seconds, 300);
    }

    #[tokio::test]
    async fn test_bad_request_keeps_connection() {
        let fixture = spawn_server();
        let mut stream = UnixStream::connect(&fixture.socket_path).await.unwrap();

        let garbage = b"{\"type\":\"launch\"}";
        stream.write_all(&(garbage.len() as u32).to_le_bytes()).await.unwrap();
        stream.write_all(garbage).await.unwrap();
        let body = read_message(&mut stream).await.unwrap().unwrap();
        let resp: Response = serde_json::from_slice(&body).unwrap();
        assert!(matches!(resp, Response::Error { ref code, .. } if code == "bad_request"));

        assert_eq!(request(&mut stream, &Request::Ping).await, Response::Pong);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_receives_events() {
        let fixture = spawn_server();
        let mut stream = UnixStream::connect(&fixture.socket_path).await.unwrap();

        assert_eq!(
            request(&mut stream, &Request::Subscribe).await,
            Response::Subscribed
        );
        fixture.engine.start();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let mut cues = Vec::new();
        while let Ok(Ok(Some(body))) =
            tokio::time::timeout(Duration::from_millis(100), read_message(&mut stream)).await
        {
            if let Ok(Notification::Event { event: SessionEvent::Cue { cue } }) =
                serde_json::from_slice::<Notification>(&body)
            {
                cues.push(cue);
            }
        }

        assert_eq!(cues, vec![Cue::WorkStart, Cue::RestStart, Cue::Done]);
    }
}
