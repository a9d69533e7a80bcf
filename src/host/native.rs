//! Native messaging client for the extension shim
//!
//! The browser starts this process and talks to it over stdin/stdout. A reader
//! task splits the inbound stream into events (forwarded to the engine) and
//! replies (matched to pending queries by id); a writer task owns the output
//! stream so commands never interleave.

use super::protocol::{
    decode_inbound, encode_frame, read_frame, write_frame, Command, Inbound, Outbound, Query,
};
use super::{Host, HostError};
use crate::core::events::HostEvent;
use crate::counter::{Snapshot, TabId};
use crate::icon::IconFrames;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

type Reply = Result<Value, String>;
type PendingMap = Arc<parking_lot::Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// [`Host`] backed by the browser's native messaging channel.
pub struct NativeHost {
    /// Encoded frames for the writer task
    out_tx: mpsc::UnboundedSender<Vec<u8>>,
    /// Request id counter (skips 0)
    seq: AtomicU64,
    /// Queries waiting for a reply, keyed by request id
    pending: PendingMap,
    /// Whether the inbound stream is still open
    connected: Arc<AtomicBool>,
}

impl NativeHost {
    /// Start the reader and writer tasks. The returned receiver yields browser
    /// events and closes when the browser closes the stream.
    pub fn spawn<R, W>(reader: R, writer: W) -> (Self, mpsc::UnboundedReceiver<HostEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<HostEvent>();
        let pending: PendingMap = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(run_writer(writer, out_rx));
        tokio::spawn(run_reader(
            reader,
            event_tx,
            Arc::clone(&pending),
            Arc::clone(&connected),
        ));

        let host = Self {
            out_tx,
            seq: AtomicU64::new(1),
            pending,
            connected,
        };
        (host, event_rx)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn next_seq(&self) -> u64 {
        loop {
            let s = self.seq.fetch_add(1, Ordering::Relaxed);
            if s != 0 {
                return s;
            }
        }
    }

    fn send(&self, message: &Outbound) -> Result<(), HostError> {
        let frame = encode_frame(message)?;
        self.out_tx
            .send(frame)
            .map_err(|_| HostError::Disconnected)
    }

    fn command(&self, command: Command) -> Result<(), HostError> {
        self.send(&Outbound::Command(command))
    }

    async fn request(&self, query: Query) -> Result<Value, HostError> {
        let id = self.next_seq();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        // checked after inserting so the reader's final clear cannot be missed
        if !self.is_connected() {
            self.pending.lock().remove(&id);
            return Err(HostError::Disconnected);
        }

        if let Err(e) = self.send(&Outbound::Request { id, query }) {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(HostError::Rejected(message)),
            Err(_) => Err(HostError::Disconnected),
        }
    }
}

fn parse_reply<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, HostError> {
    serde_json::from_value(value)
        .map_err(|e| HostError::Protocol(super::ProtocolError::Json(e)))
}

impl Host for NativeHost {
    async fn snapshot(&self) -> Result<Snapshot, HostError> {
        parse_reply(self.request(Query::Snapshot).await?)
    }

    async fn active_tab(&self) -> Result<Option<TabId>, HostError> {
        parse_reply(self.request(Query::ActiveTab).await?)
    }

    async fn tab_hidden(&self, tab: TabId) -> Result<bool, HostError> {
        match self.request(Query::TabHidden { tab_id: tab }).await? {
            Value::Null => Err(HostError::NoSuchTab(tab)),
            value => parse_reply(value),
        }
    }

    async fn set_icon_frames(
        &self,
        tab: Option<TabId>,
        frames: &IconFrames,
    ) -> Result<(), HostError> {
        self.command(Command::set_icon(tab, frames))
    }

    async fn set_icon_path(&self, tab: Option<TabId>, path: &str) -> Result<(), HostError> {
        self.command(Command::SetIconPath {
            tab_id: tab,
            path: path.to_string(),
        })
    }

    async fn set_badge_text(&self, tab: Option<TabId>, text: &str) -> Result<(), HostError> {
        self.command(Command::SetBadgeText {
            tab_id: tab,
            text: text.to_string(),
        })
    }

    async fn set_badge_background(&self, color: &str) -> Result<(), HostError> {
        self.command(Command::SetBadgeBackground {
            color: color.to_string(),
        })
    }

    async fn set_badge_text_color(&self, color: Option<&str>) -> Result<(), HostError> {
        self.command(Command::SetBadgeTextColor {
            color: color.map(str::to_string),
        })
    }

    async fn set_title(&self, tab: Option<TabId>, title: &str) -> Result<(), HostError> {
        self.command(Command::SetTitle {
            tab_id: tab,
            title: title.to_string(),
        })
    }
}

async fn run_writer<W>(mut writer: W, mut out_rx: mpsc::UnboundedReceiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = out_rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            warn!("Failed to write to browser: {}", e);
            break;
        }
    }
    debug!("Writer task finished");
}

async fn run_reader<R>(
    mut reader: R,
    event_tx: mpsc::UnboundedSender<HostEvent>,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let payload = match read_frame(&mut reader).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                info!("Browser closed the connection");
                break;
            }
            Err(e) => {
                // framing is lost after a bad length prefix
                warn!("Failed to read from browser: {}", e);
                break;
            }
        };

        match decode_inbound(&payload) {
            Ok(Inbound::Event(event)) => {
                trace!("Event: {}", event.name());
                if event_tx.send(event).is_err() {
                    debug!("Engine stopped, dropping events");
                    break;
                }
            }
            Ok(Inbound::Reply { id, result, error }) => {
                let reply = match error {
                    Some(message) => Err(message),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                match pending.lock().remove(&id) {
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => debug!("Reply for unknown request {}", id),
                }
            }
            Err(e) => warn!("Ignoring malformed message: {}", e),
        }
    }

    connected.store(false, Ordering::SeqCst);
    // dropping the senders wakes every waiting query with Disconnected
    pending.lock().clear();
}
