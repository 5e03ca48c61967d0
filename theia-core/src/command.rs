//! Head command surface: protocol types and synchronous client.
//!
//! Every command is a single request/acknowledge exchange: the client
//! connects, sends one framed JSON command, and reads one framed JSON
//! reply. Malformed commands (unknown kind, unparseable numerics) are
//! rejected with an explicit error reply, never defaulted.

use crate::bus::wire;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Frame channel for command requests.
pub const COMMAND_CHANNEL: &str = "command";

/// Frame channel for command replies.
pub const REPLY_CHANNEL: &str = "reply";

/// Commands accepted by a head's command server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum HeadCommand {
    /// Seek to a target step index, optionally changing speed
    Position {
        target: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f32>,
    },
    /// Seek to a rotation in degrees, optionally changing speed
    Rotation {
        degrees: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f32>,
    },
    /// Change seek speed (steps per second)
    Speed { speed: f32 },
    /// Reset current and target position to 0 (recalibration)
    Zero,
    /// Report current controller state
    Status,
}

/// Reply to a head command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum HeadReply {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<HeadStatus>,
    },
    Error {
        message: String,
    },
}

impl HeadReply {
    pub fn ok() -> Self {
        HeadReply::Ok { status: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        HeadReply::Error {
            message: message.into(),
        }
    }
}

/// Controller state reported by `Status`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HeadStatus {
    pub head: String,
    pub position: i64,
    pub target: i64,
    pub rotation: f32,
    pub speed: f32,
}

/// Synchronous client for one head's command server.
///
/// Connects per request: commands are rare (one per actuation intent) and
/// a fresh connection keeps failure handling simple: a dead head costs
/// one timeout, not a wedged persistent stream.
pub struct HeadCommandClient {
    addr: String,
    timeout: Duration,
}

impl HeadCommandClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_millis(500),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one command and wait for its acknowledgement.
    pub fn send(&self, command: &HeadCommand) -> Result<HeadReply> {
        let addr = self
            .addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Config(format!("unresolvable address: {}", self.addr)))?;

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let payload = serde_json::to_vec(command)?;
        wire::write_frame(&mut stream, COMMAND_CHANNEL, &payload)?;

        match wire::read_frame(&mut stream)? {
            Some(frame) if frame.channel == REPLY_CHANNEL => {
                Ok(serde_json::from_slice(&frame.payload)?)
            }
            Some(frame) => Err(Error::Protocol(format!(
                "unexpected reply channel: {:?}",
                frame.channel
            ))),
            None => Err(Error::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_shape() {
        let cmd = HeadCommand::Rotation {
            degrees: 342.0,
            speed: Some(25.0),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "rotation");
        assert_eq!(json["degrees"], 342.0);
        assert_eq!(json["speed"], 25.0);

        let json = serde_json::to_value(HeadCommand::Zero).unwrap();
        assert_eq!(json["command"], "zero");
    }

    #[test]
    fn unparseable_numeric_fields_fail_to_decode() {
        // A stringly-typed target must not quietly become a number.
        let raw = r#"{"command": "position", "target": "fast"}"#;
        assert!(serde_json::from_str::<HeadCommand>(raw).is_err());

        let raw = r#"{"command": "speed", "speed": "quick"}"#;
        assert!(serde_json::from_str::<HeadCommand>(raw).is_err());
    }

    #[test]
    fn unknown_command_fails_to_decode() {
        let raw = r#"{"command": "detonate"}"#;
        assert!(serde_json::from_str::<HeadCommand>(raw).is_err());
    }

    #[test]
    fn reply_round_trip() {
        let reply = HeadReply::Ok {
            status: Some(HeadStatus {
                head: "head-01".to_string(),
                position: 42,
                target: 100,
                rotation: 75.6,
                speed: 50.0,
            }),
        };
        let json = serde_json::to_string(&reply).unwrap();
        let back: HeadReply = serde_json::from_str(&json).unwrap();
        assert_eq!(reply, back);

        let err = serde_json::to_value(HeadReply::error("bad speed")).unwrap();
        assert_eq!(err["result"], "error");
        assert_eq!(err["message"], "bad speed");
    }
}
