//! Stream identifiers

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ProtocolError;

/// Unique identifier of a published stream
///
/// Publishers choose the identifier and send it as the ANNOUNCE path; relay
/// clients use the same path in DESCRIBE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Generate a fresh random identifier
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for StreamId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ProtocolError::InvalidStreamId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_agree() {
        let id = StreamId::new_v4();
        let parsed: StreamId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_reject_non_uuid_path() {
        assert_eq!(
            "live".parse::<StreamId>(),
            Err(ProtocolError::InvalidStreamId("live".into()))
        );
        assert!("".parse::<StreamId>().is_err());
    }
}
