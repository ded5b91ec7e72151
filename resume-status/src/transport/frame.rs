//! STOMP 1.2 frame encoding and decoding.
//!
//! Frames are carried one per WebSocket text message. Bodies are treated as
//! UTF-8 text because the status channel only carries JSON.

use std::fmt;
use std::str::FromStr;

use crate::errors::FrameError;

/// A STOMP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StompCommand {
    /// Client connect (1.0 style).
    Connect,
    /// Client connect (1.2 style).
    Stomp,
    /// Server handshake reply.
    Connected,
    /// Client publish.
    Send,
    /// Client subscribe.
    Subscribe,
    /// Client unsubscribe.
    Unsubscribe,
    /// Client acknowledgement.
    Ack,
    /// Client negative acknowledgement.
    Nack,
    /// Transaction begin.
    Begin,
    /// Transaction commit.
    Commit,
    /// Transaction abort.
    Abort,
    /// Client disconnect.
    Disconnect,
    /// Server message delivery.
    Message,
    /// Server receipt.
    Receipt,
    /// Server error.
    Error,
}

impl StompCommand {
    /// Returns the command as it appears on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    // CONNECT and CONNECTED headers are never escaped.
    const fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StompCommand {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "" => return Err(FrameError::MissingCommand),
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    /// The frame command.
    pub command: StompCommand,
    /// Headers in wire order. Repeated keys are kept; the first one wins.
    pub headers: Vec<(String, String)>,
    /// The frame body.
    pub body: String,
}

impl StompFrame {
    /// Creates a frame with no headers and an empty body.
    #[must_use]
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the first value of a header.
    #[must_use]
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Builds the client handshake frame.
    #[must_use]
    pub fn connect(host: &str) -> Self {
        Self::new(StompCommand::Connect)
            .header("accept-version", "1.2,1.1,1.0")
            .header("host", host)
            .header("heart-beat", "0,0")
    }

    /// Builds a subscription frame with automatic acknowledgement.
    #[must_use]
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(StompCommand::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// Builds an unsubscribe frame.
    #[must_use]
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(StompCommand::Unsubscribe).header("id", id)
    }

    /// Builds a disconnect frame.
    #[must_use]
    pub fn disconnect() -> Self {
        Self::new(StompCommand::Disconnect)
    }

    /// Encodes the frame, NUL terminator included.
    #[must_use]
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(32 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (key, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(key));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(key);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get_header("content-length").is_none() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decodes one frame.
    ///
    /// Returns `Ok(None)` for heart-beats, which are bare end-of-line
    /// sequences.
    pub fn decode(text: &str) -> Result<Option<Self>, FrameError> {
        let text = text.trim_start_matches(['\r', '\n']);
        if text.is_empty() {
            return Ok(None);
        }

        let (command_line, mut rest) = split_line(text).ok_or(FrameError::Unterminated)?;
        let command: StompCommand = command_line.parse()?;
        let escape = command.escapes_headers();

        let mut headers = Vec::new();
        loop {
            let (line, remaining) = split_line(rest).ok_or(FrameError::Unterminated)?;
            rest = remaining;
            if line.is_empty() {
                break;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
            if escape {
                headers.push((unescape_header(key)?, unescape_header(value)?));
            } else {
                headers.push((key.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| v.clone());

        let body = if let Some(raw) = content_length {
            let length: usize = raw
                .trim()
                .parse()
                .map_err(|_| FrameError::InvalidContentLength(raw.clone()))?;
            let body = rest
                .get(..length)
                .ok_or_else(|| FrameError::InvalidContentLength(raw.clone()))?;
            if !rest[length..].starts_with('\0') {
                return Err(FrameError::Unterminated);
            }
            body
        } else {
            let end = rest.find('\0').ok_or(FrameError::Unterminated)?;
            &rest[..end]
        };

        Ok(Some(Self {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

fn split_line(text: &str) -> Option<(&str, &str)> {
    let idx = text.find('\n')?;
    let line = text[..idx].strip_suffix('\r').unwrap_or(&text[..idx]);
    Some((line, &text[idx + 1..]))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some(other) => return Err(FrameError::InvalidEscape(format!("\\{other}"))),
            None => return Err(FrameError::InvalidEscape("\\".to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_connect_is_not_escaped() {
        let frame = StompFrame::connect("localhost:8080");
        assert_eq!(
            frame.encode(),
            "CONNECT\naccept-version:1.2,1.1,1.0\nhost:localhost:8080\nheart-beat:0,0\n\n\0"
        );
    }

    #[test]
    fn test_encode_subscribe() {
        let frame = StompFrame::subscribe("sub-0", "/topic/resume-status/u1");
        assert_eq!(
            frame.encode(),
            "SUBSCRIBE\nid:sub-0\ndestination:/topic/resume-status/u1\nack:auto\n\n\0"
        );
    }

    #[test]
    fn test_encode_escapes_headers_and_adds_length() {
        let frame = StompFrame::new(StompCommand::Send)
            .header("note", "a:b\nc")
            .with_body("{}");
        assert_eq!(frame.encode(), "SEND\nnote:a\\cb\\nc\ncontent-length:2\n\n{}\0");
    }

    #[test]
    fn test_decode_message() {
        let raw = "MESSAGE\ndestination:/topic/resume-status/u1\nsubscription:sub-0\nmessage-id:7\ncontent-type:application/json\n\n{\"agentName\":\"MatchingAgent\",\"status\":\"STARTED\"}\0\n";
        let frame = StompFrame::decode(raw).unwrap().unwrap();
        assert_eq!(frame.command, StompCommand::Message);
        assert_eq!(frame.get_header("subscription"), Some("sub-0"));
        assert_eq!(frame.body, r#"{"agentName":"MatchingAgent","status":"STARTED"}"#);
    }

    #[test]
    fn test_decode_crlf_lines() {
        let raw = "CONNECTED\r\nversion:1.2\r\n\r\n\0";
        let frame = StompFrame::decode(raw).unwrap().unwrap();
        assert_eq!(frame.command, StompCommand::Connected);
        assert_eq!(frame.get_header("version"), Some("1.2"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_decode_heartbeat() {
        assert_eq!(StompFrame::decode("\n").unwrap(), None);
        assert_eq!(StompFrame::decode("\r\n\r\n").unwrap(), None);
    }

    #[test]
    fn test_decode_content_length_allows_nul_free_body() {
        let raw = "ERROR\nmessage:Broker unavailable\ncontent-length:5\n\nboom!\0";
        let frame = StompFrame::decode(raw).unwrap().unwrap();
        assert_eq!(frame.get_header("message"), Some("Broker unavailable"));
        assert_eq!(frame.body, "boom!");
    }

    #[test]
    fn test_decode_unescapes_headers() {
        let raw = "MESSAGE\nnote:a\\cb\\\\c\n\n\0";
        let frame = StompFrame::decode(raw).unwrap().unwrap();
        assert_eq!(frame.get_header("note"), Some("a:b\\c"));
    }

    #[test]
    fn test_decode_first_header_wins() {
        let raw = "MESSAGE\nfoo:first\nfoo:second\n\n\0";
        let frame = StompFrame::decode(raw).unwrap().unwrap();
        assert_eq!(frame.get_header("foo"), Some("first"));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            StompFrame::decode("HELLO\n\n\0"),
            Err(FrameError::UnknownCommand("HELLO".to_string()))
        );
        assert_eq!(
            StompFrame::decode("MESSAGE\nnoheader\n\n\0"),
            Err(FrameError::MalformedHeader("noheader".to_string()))
        );
        assert_eq!(StompFrame::decode("MESSAGE\n\nbody"), Err(FrameError::Unterminated));
        assert_eq!(
            StompFrame::decode("MESSAGE\nbad:\\t\n\n\0"),
            Err(FrameError::InvalidEscape("\\t".to_string()))
        );
        assert_eq!(
            StompFrame::decode("MESSAGE\ncontent-length:99\n\nshort\0"),
            Err(FrameError::InvalidContentLength("99".to_string()))
        );
    }

    #[test]
    fn test_encode_then_decode_keeps_escaped_header() {
        let frame = StompFrame::new(StompCommand::Message)
            .header("destination", "/topic/a:b")
            .with_body("x");
        let decoded = StompFrame::decode(&frame.encode()).unwrap().unwrap();
        assert_eq!(decoded.get_header("destination"), Some("/topic/a:b"));
        assert_eq!(decoded.body, "x");
    }
}
