use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::screen::Raster;

/// Who is streaming: machine name plus the account the frames belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub host_name: String,
    pub user_name: String,
}

/// One frame as it goes over the wire.
///
/// `pixels` is the raw RGBA buffer in standard base64, not an image
/// container. Field order is part of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEnvelope {
    pub name: String,
    pub roblox_username: String,
    pub width: u32,
    pub height: u32,
    pub pixels: String,
    pub time: String,
}

impl FrameEnvelope {
    pub fn encode(raster: &Raster, identity: &Identity, captured_at: DateTime<Utc>) -> Self {
        Self {
            name: identity.host_name.clone(),
            roblox_username: identity.user_name.clone(),
            width: raster.width(),
            height: raster.height(),
            pixels: base64::engine::general_purpose::STANDARD.encode(raster.data()),
            time: format_timestamp(captured_at),
        }
    }

    /// Compact JSON, the form that gets nested as a string in request bodies.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Seconds since the epoch with exactly three fractional digits.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    let millis = at.timestamp_millis();
    format!("{}.{:03}", millis.div_euclid(1000), millis.rem_euclid(1000))
}

/// Body of the bootstrap POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitPayload {
    pub key: String,
    /// Envelope serialized to a JSON string
    pub init: String,
}

/// Body of each steady-state PUT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePayload {
    /// Envelope serialized to a JSON string
    pub frame: String,
}

impl InitPayload {
    pub fn new(key: &str, envelope: &FrameEnvelope) -> Result<Self> {
        Ok(Self {
            key: key.to_string(),
            init: envelope.to_json()?,
        })
    }
}

impl FramePayload {
    pub fn new(envelope: &FrameEnvelope) -> Result<Self> {
        Ok(Self {
            frame: envelope.to_json()?,
        })
    }
}
