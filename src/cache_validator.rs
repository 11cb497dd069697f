use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Cached payload sealed with a SHA-256 checksum.
///
/// Used for in-process profile reads and for the company news cache rows, so a
/// corrupted or hand-edited entry is treated as a miss and refetched instead of
/// flowing into resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedEntry {
    /// Serialized payload (JSON string).
    pub data: String,
    /// Hex SHA-256 over `sealed_at` and `data`.
    pub checksum: String,
    pub sealed_at: DateTime<Utc>,
}

impl SealedEntry {
    pub fn seal<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::seal_raw(serde_json::to_string(value)?, Utc::now()))
    }

    fn seal_raw(data: String, sealed_at: DateTime<Utc>) -> Self {
        let checksum = Self::compute_checksum(&data, sealed_at);
        Self {
            data,
            checksum,
            sealed_at,
        }
    }

    fn compute_checksum(data: &str, sealed_at: DateTime<Utc>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(sealed_at.timestamp_millis().to_be_bytes());
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data, self.sealed_at) == self.checksum
    }

    /// Within `max_age` of sealing.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.sealed_at <= max_age
    }

    /// The payload, or `None` when the checksum or the JSON shape is wrong.
    pub fn open<T: DeserializeOwned>(&self) -> Option<T> {
        if !self.is_valid() {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                self.checksum,
                self.data.len()
            );
            return None;
        }
        match serde_json::from_str(&self.data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Sealed cache entry has unexpected shape: {}", e);
                None
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Parses a stored entry and opens it in one step.
    pub fn open_json<T: DeserializeOwned>(stored: &serde_json::Value) -> Option<T> {
        let entry: SealedEntry = serde_json::from_value(stored.clone()).ok()?;
        entry.open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewsDigest;

    fn digest() -> NewsDigest {
        NewsDigest {
            answer: Some("Acme expands cloud footprint".to_string()),
            result_count: 1,
            themes: vec!["cloud".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_sealed_entry_opens() {
        let entry = SealedEntry::seal(&digest()).unwrap();
        assert!(entry.is_valid());
        assert_eq!(entry.open::<NewsDigest>(), Some(digest()));
    }

    #[test]
    fn test_json_roundtrip_through_storage() {
        let stored = SealedEntry::seal(&digest()).unwrap().to_json();
        assert_eq!(SealedEntry::open_json::<NewsDigest>(&stored), Some(digest()));
    }

    #[test]
    fn test_tampered_data_rejected() {
        let mut entry = SealedEntry::seal(&digest()).unwrap();
        entry.data = entry.data.replace("cloud", "hacked");
        assert!(!entry.is_valid());
        assert_eq!(entry.open::<NewsDigest>(), None);
    }

    #[test]
    fn test_backdated_entry_rejected() {
        let mut entry = SealedEntry::seal(&digest()).unwrap();
        entry.sealed_at = entry.sealed_at - Duration::hours(48);
        assert!(!entry.is_valid());
    }

    #[test]
    fn test_freshness_window() {
        let now = Utc::now();
        let entry = SealedEntry::seal_raw("{}".to_string(), now - Duration::hours(25));
        assert!(!entry.is_fresh(Duration::hours(24), now));
        assert!(entry.is_fresh(Duration::hours(26), now));
    }

    #[test]
    fn test_checksum_consistency() {
        let at = Utc::now();
        let a = SealedEntry::seal_raw("test data".to_string(), at);
        let b = SealedEntry::seal_raw("test data".to_string(), at);
        assert_eq!(a.checksum, b.checksum);
    }

    #[test]
    fn test_garbage_is_a_miss() {
        assert_eq!(
            SealedEntry::open_json::<NewsDigest>(&serde_json::json!({"data": 1})),
            None
        );
    }
}
