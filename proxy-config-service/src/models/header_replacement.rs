//! Header replacement model - a header injected by the proxy, value encrypted at rest.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Hex-encoded `nonce || ciphertext || tag` blob produced by the secret cipher.
///
/// Deliberately not `Serialize`: the blob is an at-rest format, not an API field.
#[derive(Clone, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct EncryptedValue(String);

impl EncryptedValue {
    /// Wrap a blob read back from storage.
    pub fn from_stored(blob: String) -> Self {
        Self(blob)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for EncryptedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptedValue({} hex chars)", self.0.len())
    }
}

/// Header replacement entity.
#[derive(Debug, Clone, FromRow)]
pub struct HeaderReplacement {
    pub header_id: Uuid,
    pub config_id: Uuid,
    pub header_name: String,
    pub header_value: EncryptedValue,
    pub created_utc: DateTime<Utc>,
}

impl HeaderReplacement {
    pub fn new(config_id: Uuid, header_name: String, header_value: EncryptedValue) -> Self {
        Self {
            header_id: Uuid::new_v4(),
            config_id,
            header_name,
            header_value,
            created_utc: Utc::now(),
        }
    }

    pub fn belongs_to(&self, config_id: Uuid) -> bool {
        self.config_id == config_id
    }
}

/// Listing view of a header replacement: the value is elided.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderReplacementSummary {
    pub header_id: Uuid,
    pub config_id: Uuid,
    pub header_name: String,
}

impl From<&HeaderReplacement> for HeaderReplacementSummary {
    fn from(h: &HeaderReplacement) -> Self {
        Self {
            header_id: h.header_id,
            config_id: h.config_id,
            header_name: h.header_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_never_carries_the_value() {
        let header = HeaderReplacement::new(
            Uuid::new_v4(),
            "Authorization".to_string(),
            EncryptedValue::from_stored("abcd".to_string()),
        );
        let json = serde_json::to_value(HeaderReplacementSummary::from(&header)).unwrap();
        assert!(json.get("header_value").is_none());
        assert_eq!(json["header_name"], "Authorization");
    }
}
