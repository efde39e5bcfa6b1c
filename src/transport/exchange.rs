use crate::{
    share::{bufs_to_hex, get_current_time},
    GsqErr, ServerInfo,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeEntry {
    pub direction: Direction,
    pub bufs: Vec<u8>,
    pub timestamp: f64,
}

/// Append-only record of every packet that went over the wire during one
/// query call. Only used for diagnostics and for recording replay fixtures.
#[derive(Debug, Clone, Default)]
pub struct ExchangeLog {
    entries: Vec<ExchangeEntry>,
}

impl ExchangeLog {
    pub fn create() -> Self {
        Self::default()
    }

    fn push(&mut self, direction: Direction, bufs: &[u8]) {
        self.entries.push(ExchangeEntry {
            direction,
            bufs: bufs.to_vec(),
            timestamp: get_current_time().unwrap_or_default(),
        });
    }

    pub fn sent(&mut self, bufs: &[u8]) {
        self.push(Direction::Sent, bufs);
    }

    pub fn received(&mut self, bufs: &[u8]) {
        self.push(Direction::Received, bufs);
    }

    pub fn entries(&self) -> &[ExchangeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pair every sent packet with the first packet received after it.
    /// Additional received packets become captures with an empty `sent`.
    pub fn to_captures(&self) -> Vec<Capture> {
        let mut captures: Vec<Capture> = Vec::new();
        let mut awaiting_reply = false;

        for entry in &self.entries {
            match entry.direction {
                Direction::Sent => {
                    captures.push(Capture::create(&entry.bufs, &[], entry.timestamp));
                    awaiting_reply = true;
                }
                Direction::Received => match captures.last_mut() {
                    Some(last) if awaiting_reply => {
                        last.received = BASE64_STANDARD.encode(&entry.bufs);
                        awaiting_reply = false;
                    }
                    _ => captures.push(Capture::create(&[], &entry.bufs, entry.timestamp)),
                },
            }
        }

        captures
    }

    /// Package this exchange as a replay document, optionally with the
    /// result it produced.
    pub fn to_replay_document(&self, protocol: &str, server_info: Option<ServerInfo>) -> ReplayDocument {
        ReplayDocument {
            protocol: Some(protocol.into()),
            normalized_version: None,
            captures: self.to_captures(),
            server_info,
        }
    }
}

impl std::fmt::Display for ExchangeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in &self.entries {
            let arrow = match entry.direction {
                Direction::Sent => ">",
                Direction::Received => "<",
            };

            writeln!(f, "{} [{}] {}", arrow, entry.bufs.len(), bufs_to_hex(&entry.bufs))?;
        }

        Ok(())
    }
}

/// One request/response pair, base64 encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Capture {
    #[serde(default)]
    pub sent: String,
    #[serde(default)]
    pub received: String,
    #[serde(default)]
    pub timestamp: f64,
}

impl Capture {
    pub fn create(sent: &[u8], received: &[u8], timestamp: f64) -> Self {
        Self {
            sent: BASE64_STANDARD.encode(sent),
            received: BASE64_STANDARD.encode(received),
            timestamp,
        }
    }

    pub fn sent_bufs(&self) -> Result<Vec<u8>, GsqErr> {
        Ok(BASE64_STANDARD.decode(&self.sent)?)
    }

    pub fn received_bufs(&self) -> Result<Vec<u8>, GsqErr> {
        Ok(BASE64_STANDARD.decode(&self.received)?)
    }
}

/// Recorded exchange plus the result it is expected to normalize into.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ReplayDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_version: Option<String>,
    pub captures: Vec<Capture>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
}

impl ReplayDocument {
    pub fn from_json(json: &str) -> Result<Self, GsqErr> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, GsqErr> {
        serde_json::to_string_pretty(self).map_err(|err| GsqErr::InternalErr(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_pair_requests_with_replies() {
        let mut log = ExchangeLog::create();
        log.sent(b"ping");
        log.received(b"pong");
        log.received(b"pong 2");
        log.sent(b"lost");

        let captures = log.to_captures();

        assert_eq!(captures.len(), 3);
        assert_eq!(captures[0].sent_bufs().unwrap(), b"ping");
        assert_eq!(captures[0].received_bufs().unwrap(), b"pong");
        assert!(captures[1].sent_bufs().unwrap().is_empty());
        assert_eq!(captures[1].received_bufs().unwrap(), b"pong 2");
        assert_eq!(captures[2].sent_bufs().unwrap(), b"lost");
        assert!(captures[2].received_bufs().unwrap().is_empty());
    }

    #[test]
    fn display_is_hex() {
        let mut log = ExchangeLog::create();
        log.sent(&[0xFF, 0x54]);
        log.received(&[0x49]);

        assert_eq!(log.to_string(), "> [2] FF 54\n< [1] 49\n");
    }

    #[test]
    fn invalid_base64_is_conf_error() {
        let capture = Capture {
            sent: "not base64!".into(),
            received: String::new(),
            timestamp: 0.0,
        };

        assert!(capture.sent_bufs().unwrap_err().is_conf());
    }

    #[test]
    fn document_json() {
        let json = r#"{
            "protocol": "source",
            "captures": [{ "sent": "/////w==", "received": "SQ==", "timestamp": 1.5 }]
        }"#;
        let doc = ReplayDocument::from_json(json).unwrap();

        assert_eq!(doc.protocol.as_deref(), Some("source"));
        assert_eq!(doc.captures[0].sent_bufs().unwrap(), [0xFF; 4]);
        assert_eq!(doc.captures[0].received_bufs().unwrap(), b"I");
        assert!(doc.server_info.is_none());
        assert!(ReplayDocument::from_json("{").unwrap_err().is_conf());
    }
}
