/// Key layout and encoding utilities for Fjall partitions
///
/// Partition structure:
/// - `requests`: req:{id} -> PrintRequest (JSON)
/// - `by_status`: {STATUS}:{created_at_ms:020}:{id} -> id
/// - `leases`: lease:{name} -> Lease (JSON)
///
/// The zero-padded timestamp makes a prefix scan over `by_status` return
/// requests oldest first.
use chrono::{DateTime, Utc};

use crate::models::PrintRequestStatus;

/// Encode a request key: req:{id}
pub fn encode_request_key(id: &str) -> Vec<u8> {
    format!("req:{}", id).into_bytes()
}

/// Encode a status index key: {STATUS}:{created_at_ms:020}:{id}
pub fn encode_status_key(
    status: PrintRequestStatus,
    created_at: DateTime<Utc>,
    id: &str,
) -> Vec<u8> {
    let millis = created_at.timestamp_millis().max(0);
    format!("{}:{:020}:{}", status.as_str(), millis, id).into_bytes()
}

/// Encode a status prefix for range scan: {STATUS}:
pub fn encode_status_prefix(status: PrintRequestStatus) -> Vec<u8> {
    format!("{}:", status.as_str()).into_bytes()
}

/// Decode a status index key -> (created_at_ms, id)
pub fn decode_status_key(key: &[u8]) -> Option<(u64, String)> {
    let key_str = std::str::from_utf8(key).ok()?;
    let mut parts = key_str.splitn(3, ':');
    let _status = parts.next()?;
    let millis = parts.next()?.parse().ok()?;
    let id = parts.next()?.to_string();
    Some((millis, id))
}

/// Encode a lease key: lease:{name}
pub fn encode_lease_key(name: &str) -> Vec<u8> {
    format!("lease:{}", name).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_request_key_encoding() {
        let key = encode_request_key("pr_123");
        assert_eq!(key, b"req:pr_123");
    }

    #[test]
    fn test_status_key_encoding() {
        let created_at = Utc.timestamp_millis_opt(42).unwrap();
        let key = encode_status_key(PrintRequestStatus::Pending, created_at, "pr_1");
        assert_eq!(key, b"PENDING:00000000000000000042:pr_1");

        let (millis, id) = decode_status_key(&key).unwrap();
        assert_eq!(millis, 42);
        assert_eq!(id, "pr_1");
    }

    #[test]
    fn test_status_keys_sort_oldest_first() {
        let older = encode_status_key(
            PrintRequestStatus::Pending,
            Utc.timestamp_millis_opt(9_000).unwrap(),
            "zzz",
        );
        let newer = encode_status_key(
            PrintRequestStatus::Pending,
            Utc.timestamp_millis_opt(10_000).unwrap(),
            "aaa",
        );
        assert!(older < newer);
    }

    #[test]
    fn test_status_prefix() {
        assert_eq!(encode_status_prefix(PrintRequestStatus::Batched), b"BATCHED:");
    }

    #[test]
    fn test_lease_key_encoding() {
        assert_eq!(encode_lease_key("process-print-requests"), b"lease:process-print-requests");
    }
}
