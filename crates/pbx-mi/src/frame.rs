use std::collections::HashMap;

/// A single PBX-MI frame: an ordered bag of `Key: Value` lines terminated by
/// a blank line. Order is preserved because some frames (events) repeat a
/// key (e.g. multiple `ChanVariable` lines) and callers may care about the
/// first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pairs: Vec<(String, String)>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The frame's `Event` header, if this is an event frame rather than an
    /// action response.
    pub fn event_name(&self) -> Option<&str> {
        self.get("Event")
    }

    pub fn is_response(&self) -> bool {
        self.get("Response").is_some()
    }

    pub fn is_success(&self) -> bool {
        self.get("Response")
            .map(|v| v.eq_ignore_ascii_case("Success"))
            .unwrap_or(false)
    }

    pub fn action_id(&self) -> Option<&str> {
        self.get("ActionID")
    }

    /// Serialises into the wire format: `Key: Value\r\n` lines followed by a
    /// blank `\r\n`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = String::new();
        for (k, v) in &self.pairs {
            buf.push_str(k);
            buf.push_str(": ");
            buf.push_str(v);
            buf.push_str("\r\n");
        }
        buf.push_str("\r\n");
        buf.into_bytes()
    }

    /// Parses one frame's worth of already-split, CRLF-stripped lines.
    pub fn parse_lines(lines: &[String]) -> Frame {
        let mut frame = Frame::new();
        for line in lines {
            if let Some((key, value)) = line.split_once(':') {
                frame.insert(key.trim(), value.trim());
            }
        }
        frame
    }

    pub fn as_map(&self) -> HashMap<String, String> {
        self.pairs.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_round_trips_through_parse() {
        let frame = Frame::new()
            .with("Action", "Login")
            .with("Username", "admin")
            .with("Secret", "hunter2");
        let encoded = frame.encode();
        let text = String::from_utf8(encoded).unwrap();
        let lines: Vec<String> = text
            .split("\r\n")
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect();
        let parsed = Frame::parse_lines(&lines);
        assert_eq!(parsed.get("Action"), Some("Login"));
        assert_eq!(parsed.get("Username"), Some("admin"));
    }

    #[test]
    fn response_helpers() {
        let frame = Frame::new().with("Response", "Success").with("ActionID", "42");
        assert!(frame.is_success());
        assert_eq!(frame.action_id(), Some("42"));
    }
}
