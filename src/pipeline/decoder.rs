//! Event decoding - raw subscription payload into [`Event`]

use super::types::Event;

#[derive(Debug)]
pub enum DecodeError {
    /// Payload was not valid JSON or lacked a required field
    Malformed(serde_json::Error),
    Empty,
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err)
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed(e) => write!(f, "Malformed event payload: {}", e),
            DecodeError::Empty => write!(f, "Empty event payload"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Parse one payload. Never panics; a bad payload only affects its own event.
pub fn decode(raw: &[u8]) -> Result<Event, DecodeError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    Ok(serde_json::from_slice(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_payload() {
        let event = decode(br#"{"message":"\"abc123\"","sourceTag":"psbmon"}"#).unwrap();
        assert_eq!(event.message, "\"abc123\"");
        assert_eq!(event.source_tag, "psbmon");
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let raw = br#"{"message":"\"x\"","sourceTag":"a","host":"h1","ts":17}"#;
        let event = decode(raw).unwrap();
        assert_eq!(event.source_tag, "a");
    }

    #[test]
    fn test_decode_accepts_user_agent_alias() {
        let event = decode(br#"{"message":"\"x\"","user_agent":"psbmon"}"#).unwrap();
        assert_eq!(event.source_tag, "psbmon");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases: [&[u8]; 6] = [
            b"not json",
            b"{\"message\":\"x\"}",
            b"{\"sourceTag\":\"a\"}",
            b"{\"message\":1,\"sourceTag\":\"a\"}",
            b"[1,2,3]",
            &[0xff, 0xfe, 0x00],
        ];

        for raw in cases {
            assert!(
                matches!(decode(raw), Err(DecodeError::Malformed(_))),
                "expected malformed for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(decode(b""), Err(DecodeError::Empty)));
        assert!(matches!(decode(b"  \n"), Err(DecodeError::Empty)));
    }
}
