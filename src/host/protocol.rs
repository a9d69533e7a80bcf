//! Native messaging wire format
//!
//! Each message is a 32-bit length in native byte order followed by that
//! many bytes of UTF-8 JSON. Browsers cap host-to-browser messages at 1 MiB
//! and send at most 64 MiB the other way.

use crate::core::events::HostEvent;
use crate::counter::TabId;
use crate::icon::{IconFrames, IconImage};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message the browser accepts from the host
pub const MAX_OUTBOUND_SIZE: usize = 1024 * 1024;

/// Largest message the browser sends to the host
pub const MAX_INBOUND_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// Questions the host asks the shim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "camelCase")]
pub enum Query {
    Snapshot,
    ActiveTab,
    #[serde(rename_all = "camelCase")]
    TabHidden { tab_id: TabId },
}

/// `ImageData`-shaped pixels with base64 RGBA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: String,
}

impl From<&IconImage> for ImageData {
    fn from(image: &IconImage) -> Self {
        Self {
            width: image.size,
            height: image.size,
            data: base64::engine::general_purpose::STANDARD.encode(&image.rgba),
        }
    }
}

/// Fire-and-forget browser action calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    SetIcon {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        /// Keyed by icon size ("16", "32")
        image_data: BTreeMap<String, ImageData>,
    },

    #[serde(rename_all = "camelCase")]
    SetIconPath {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        path: String,
    },

    #[serde(rename_all = "camelCase")]
    SetBadgeText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        text: String,
    },

    #[serde(rename = "setBadgeBackgroundColor")]
    SetBadgeBackground { color: String },

    SetBadgeTextColor { color: Option<String> },

    #[serde(rename_all = "camelCase")]
    SetTitle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        title: String,
    },
}

impl Command {
    pub fn set_icon(tab_id: Option<TabId>, frames: &IconFrames) -> Self {
        let mut image_data = BTreeMap::new();
        for image in [&frames.small, &frames.large] {
            image_data.insert(image.size.to_string(), ImageData::from(image));
        }
        Command::SetIcon {
            tab_id,
            image_data,
        }
    }
}

/// Host to shim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outbound {
    Request {
        id: u64,
        #[serde(flatten)]
        query: Query,
    },
    Command(Command),
}

/// Shim to host
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    /// Answer to a [`Query`]
    Reply {
        id: u64,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
    Event(HostEvent),
}

/// Serialize and length-prefix a message
pub fn encode_frame(message: &Outbound) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(message)?;
    if json.len() > MAX_OUTBOUND_SIZE {
        return Err(ProtocolError::TooLarge {
            size: json.len(),
            limit: MAX_OUTBOUND_SIZE,
        });
    }
    let mut frame = Vec::with_capacity(4 + json.len());
    frame.extend_from_slice(&(json.len() as u32).to_ne_bytes());
    frame.extend_from_slice(&json);
    Ok(frame)
}

pub fn decode_inbound(payload: &[u8]) -> Result<Inbound, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Read one message payload. `Ok(None)` means the browser closed the stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = u32::from_ne_bytes(header) as usize;
    if size > MAX_INBOUND_SIZE {
        return Err(ProtocolError::TooLarge {
            size,
            limit: MAX_INBOUND_SIZE,
        });
    }

    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
