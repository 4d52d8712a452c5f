//! Carrier media-stream wire format.
//!
//! JSON text messages in both directions. Inbound: `connected`, `start`,
//! `media`, `mark`, `stop`; every message after `connected` carries the
//! `streamSid`. Outbound: `media` with base64 mu-law and `clear` to flush the
//! carrier's playback buffer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Metadata of the `start` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
}

/// Body of an inbound `media` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMedia {
    /// Base64 mu-law, 8 kHz mono.
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarkLabel {
    pub name: String,
}

/// A message received from the carrier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierEvent {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },
    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        start: StreamStart,
    },
    Media {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        media: InboundMedia,
    },
    Mark {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        mark: MarkLabel,
    },
    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    /// Anything we do not act on (`dtmf`, future events).
    #[serde(other)]
    Unknown,
}

impl CarrierEvent {
    pub fn parse(text: &str) -> Result<Self, AudioError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Stream id of a `start` event, preferring the nested metadata.
    #[must_use]
    pub fn started_stream(&self) -> Option<&str> {
        match self {
            Self::Start { start, .. } => Some(&start.stream_sid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

/// A message sent to the carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierCommand {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl CarrierCommand {
    /// Wrap raw mu-law bytes as an outbound media message.
    #[must_use]
    pub fn media(stream_sid: &str, mulaw: &[u8]) -> Self {
        Self::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia {
                payload: STANDARD.encode(mulaw),
            },
        }
    }

    #[must_use]
    pub fn clear(stream_sid: &str) -> Self {
        Self::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, AudioError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode a base64 media payload into mu-law bytes.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, AudioError> {
    Ok(STANDARD.decode(payload.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_event() {
        let text = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "start": {
                "accountSid": "AC1",
                "streamSid": "MZ42",
                "callSid": "CA7",
                "tracks": ["inbound"],
                "mediaFormat": { "encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1 }
            },
            "streamSid": "MZ42"
        }"#;
        let event = CarrierEvent::parse(text).unwrap();
        assert_eq!(event.started_stream(), Some("MZ42"));
        let CarrierEvent::Start { start, .. } = event else {
            panic!("not a start event");
        };
        assert_eq!(start.call_sid.as_deref(), Some("CA7"));
    }

    #[test]
    fn parses_media_event() {
        let text = r#"{"event":"media","sequenceNumber":"3","media":{"track":"inbound","chunk":"1","timestamp":"5","payload":"//8="},"streamSid":"MZ42"}"#;
        let CarrierEvent::Media { media, stream_sid } = CarrierEvent::parse(text).unwrap() else {
            panic!("not a media event");
        };
        assert_eq!(stream_sid.as_deref(), Some("MZ42"));
        assert_eq!(decode_payload(&media.payload).unwrap(), vec![0xFF, 0xFF]);
    }

    #[test]
    fn unknown_events_are_tolerated() {
        let text = r#"{"event":"dtmf","streamSid":"MZ42","dtmf":{"digit":"1"}}"#;
        assert_eq!(CarrierEvent::parse(text).unwrap(), CarrierEvent::Unknown);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            CarrierEvent::parse("{not json"),
            Err(AudioError::MalformedMessage(_))
        ));
    }

    #[test]
    fn bad_base64_is_an_error() {
        assert!(matches!(
            decode_payload("***"),
            Err(AudioError::InvalidPayload(_))
        ));
    }

    #[test]
    fn outbound_media_shape() {
        let json = CarrierCommand::media("MZ42", &[0xFF, 0xFF]).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"event":"media","streamSid":"MZ42","media":{"payload":"//8="}}"#
        );
        let json = CarrierCommand::clear("MZ42").to_json().unwrap();
        assert_eq!(json, r#"{"event":"clear","streamSid":"MZ42"}"#);
    }
}
