use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Config, PartitionCreateOptions, TxKeyspace, TxPartitionHandle, WriteTransaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::{LedgerError, Result};
use super::partitions::{
    decode_status_key, encode_lease_key, encode_request_key, encode_status_key,
    encode_status_prefix,
};
use super::traits::{LeaseStore, PrintRequestStore};
use crate::models::{PrintRequest, PrintRequestStatus};

/// Holder of a named lease
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Fjall-backed print request ledger and lease table
///
/// Status changes run inside a write transaction; Fjall serializes write
/// transactions, which gives compare-and-set semantics to every task and
/// thread sharing this store.
#[derive(Clone)]
pub struct FjallStore {
    keyspace: TxKeyspace,
    requests: TxPartitionHandle,
    by_status: TxPartitionHandle,
    leases: TxPartitionHandle,
}

impl FjallStore {
    /// Open or create a Fjall store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open_transactional()?;

        let requests = keyspace.open_partition("requests", PartitionCreateOptions::default())?;
        let by_status = keyspace.open_partition("by_status", PartitionCreateOptions::default())?;
        let leases = keyspace.open_partition("leases", PartitionCreateOptions::default())?;

        info!("Fjall store opened successfully");
        Ok(Self {
            keyspace,
            requests,
            by_status,
            leases,
        })
    }

    /// Record a new print request (ingest side; the pipeline never calls this)
    pub fn insert(&self, request: &PrintRequest) -> Result<()> {
        let mut tx = self.keyspace.write_tx();
        let key = encode_request_key(&request.id);

        if tx.get(&self.requests, &key)?.is_some() {
            return Err(LedgerError::DuplicateRequest(request.id.clone()));
        }

        tx.insert(&self.requests, key, serde_json::to_vec(request)?);
        tx.insert(
            &self.by_status,
            encode_status_key(request.status, request.created_at, &request.id),
            request.id.as_bytes(),
        );
        tx.commit()?;

        debug!(id = %request.id, status = %request.status, "Inserted print request");
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<PrintRequest>> {
        match self.requests.get(encode_request_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn scan_status(&self, status: PrintRequestStatus, limit: usize) -> Result<Vec<PrintRequest>> {
        let tx = self.keyspace.read_tx();
        let mut ids = Vec::new();

        for item in tx.prefix(&self.by_status, encode_status_prefix(status)).take(limit) {
            let (key, _) = item?;
            let (_, id) = decode_status_key(&key).ok_or_else(|| {
                LedgerError::InvalidKey(String::from_utf8_lossy(&key).to_string())
            })?;
            ids.push(id);
        }

        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            let value = tx
                .get(&self.requests, encode_request_key(&id))?
                .ok_or_else(|| LedgerError::RequestNotFound(id.clone()))?;
            requests.push(serde_json::from_slice(&value)?);
        }

        Ok(requests)
    }

    /// Apply one guarded transition inside `tx`; false when the stored
    /// status is not `expected`
    fn transition_in<F>(
        &self,
        tx: &mut WriteTransaction,
        id: &str,
        expected: PrintRequestStatus,
        new: PrintRequestStatus,
        mutate: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut PrintRequest),
    {
        if !expected.can_transition_to(new) {
            return Err(LedgerError::IllegalTransition {
                from: expected,
                to: new,
            });
        }

        let key = encode_request_key(id);
        let value = tx
            .get(&self.requests, &key)?
            .ok_or_else(|| LedgerError::RequestNotFound(id.to_string()))?;
        let mut request: PrintRequest = serde_json::from_slice(&value)?;

        if request.status != expected {
            return Ok(false);
        }

        tx.remove(
            &self.by_status,
            encode_status_key(request.status, request.created_at, id),
        );

        request.status = new;
        request.status_updated_at = Utc::now();
        mutate(&mut request);

        tx.insert(
            &self.by_status,
            encode_status_key(new, request.created_at, id),
            id.as_bytes(),
        );
        tx.insert(&self.requests, key, serde_json::to_vec(&request)?);

        Ok(true)
    }

    fn transition<F>(
        &self,
        id: &str,
        expected: PrintRequestStatus,
        new: PrintRequestStatus,
        mutate: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut PrintRequest),
    {
        let mut tx = self.keyspace.write_tx();
        let applied = self.transition_in(&mut tx, id, expected, new, mutate)?;
        if applied {
            tx.commit()?;
            debug!(id, %expected, %new, "Status transitioned");
        }
        Ok(applied)
    }

    /// Lease acquisition against an explicit clock reading
    pub fn try_acquire_at(
        &self,
        name: &str,
        owner: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.keyspace.write_tx();
        let key = encode_lease_key(name);

        if let Some(value) = tx.get(&self.leases, &key)? {
            let current: Lease = serde_json::from_slice(&value)?;
            if current.owner != owner && current.expires_at > now {
                debug!(name, holder = %current.owner, "Lease held elsewhere");
                return Ok(false);
            }
        }

        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let lease = Lease {
            owner: owner.to_string(),
            acquired_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        tx.insert(&self.leases, key, serde_json::to_vec(&lease)?);
        tx.commit()?;

        debug!(name, owner, expires_at = %lease.expires_at, "Lease acquired");
        Ok(true)
    }

    pub fn current_lease(&self, name: &str) -> Result<Option<Lease>> {
        match self.leases.get(encode_lease_key(name))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Number of requests per status
    pub fn status_counts(&self) -> Result<HashMap<PrintRequestStatus, usize>> {
        let tx = self.keyspace.read_tx();
        let mut counts = HashMap::new();

        for status in [
            PrintRequestStatus::Pending,
            PrintRequestStatus::Batched,
            PrintRequestStatus::Dispatched,
            PrintRequestStatus::Failed,
        ] {
            let mut count = 0;
            for item in tx.prefix(&self.by_status, encode_status_prefix(status)) {
                item?;
                count += 1;
            }
            counts.insert(status, count);
        }

        Ok(counts)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl PrintRequestStore for FjallStore {
    async fn find_by_status(
        &self,
        status: PrintRequestStatus,
        limit: usize,
    ) -> Result<Vec<PrintRequest>> {
        self.scan_status(status, limit)
    }

    async fn get(&self, id: &str) -> Result<Option<PrintRequest>> {
        self.load(id)
    }

    async fn compare_and_set_status(
        &self,
        id: &str,
        expected: PrintRequestStatus,
        new: PrintRequestStatus,
    ) -> Result<bool> {
        self.transition(id, expected, new, |_| {})
    }

    async fn claim_for_batch(&self, id: &str, batch_id: &str) -> Result<bool> {
        self.transition(
            id,
            PrintRequestStatus::Pending,
            PrintRequestStatus::Batched,
            |request| request.batch_id = Some(batch_id.to_string()),
        )
    }

    async fn compare_and_set_all(
        &self,
        ids: &[String],
        expected: PrintRequestStatus,
        new: PrintRequestStatus,
    ) -> Result<bool> {
        let mut tx = self.keyspace.write_tx();

        for id in ids {
            if !self.transition_in(&mut tx, id, expected, new, |_| {})? {
                // Dropping the transaction discards every change made so far
                debug!(id = %id, %expected, %new, "Batch transition aborted");
                return Ok(false);
            }
        }

        tx.commit()?;
        debug!(count = ids.len(), %expected, %new, "Batch transitioned");
        Ok(true)
    }

    async fn mark_failed(
        &self,
        id: &str,
        expected: PrintRequestStatus,
        reason: &str,
    ) -> Result<bool> {
        self.transition(id, expected, PrintRequestStatus::Failed, |request| {
            request.failure_reason = Some(reason.to_string())
        })
    }
}

#[async_trait]
impl LeaseStore for FjallStore {
    async fn try_acquire(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool> {
        self.try_acquire_at(name, owner, ttl, Utc::now())
    }

    async fn release(&self, name: &str, owner: &str) -> Result<bool> {
        let mut tx = self.keyspace.write_tx();
        let key = encode_lease_key(name);

        let Some(value) = tx.get(&self.leases, &key)? else {
            return Ok(false);
        };
        let current: Lease = serde_json::from_slice(&value)?;
        if current.owner != owner {
            return Ok(false);
        }

        tx.remove(&self.leases, key);
        tx.commit()?;

        debug!(name, owner, "Lease released");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PhotoReference, SourceType};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_store() -> (FjallStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("test_ledger")).unwrap();
        (store, temp_dir)
    }

    fn create_test_request(id: &str, created_ms: i64) -> PrintRequest {
        let created_at = Utc.timestamp_millis_opt(created_ms).unwrap();
        PrintRequest {
            id: id.to_string(),
            source_type: SourceType::VoterCard,
            source_reference: format!("app-{id}"),
            gss_code: "E99999999".to_string(),
            certificate_number: format!("CERT-{id}"),
            status: PrintRequestStatus::Pending,
            photo: PhotoReference {
                bucket: None,
                path: format!("photos/{id}.png"),
            },
            placeholders: Default::default(),
            created_at,
            valid_on_date: None,
            batch_id: None,
            failure_reason: None,
            status_updated_at: created_at,
        }
    }

    #[test]
    fn test_open_store() {
        let temp_dir = TempDir::new().unwrap();
        assert!(FjallStore::open(temp_dir.path().join("test_ledger")).is_ok());
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let (store, _temp) = create_test_store();
        let request = create_test_request("pr_1", 1_000);

        store.insert(&request).unwrap();
        let err = store.insert(&request).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateRequest(id) if id == "pr_1"));
    }

    #[tokio::test]
    async fn test_find_pending_is_oldest_first() {
        let (store, _temp) = create_test_store();
        store.insert(&create_test_request("newest", 3_000)).unwrap();
        store.insert(&create_test_request("oldest", 1_000)).unwrap();
        store.insert(&create_test_request("middle", 2_000)).unwrap();

        let pending = store.find_pending(2).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["oldest", "middle"]);
    }

    #[tokio::test]
    async fn test_compare_and_set_only_applies_once() {
        let (store, _temp) = create_test_store();
        store.insert(&create_test_request("pr_1", 1_000)).unwrap();

        assert!(store.claim_for_batch("pr_1", "batch-a").await.unwrap());
        assert!(!store.claim_for_batch("pr_1", "batch-b").await.unwrap());

        let stored = store.get("pr_1").await.unwrap().unwrap();
        assert_eq!(stored.status, PrintRequestStatus::Batched);
        assert_eq!(stored.batch_id.as_deref(), Some("batch-a"));
        assert!(store.find_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_illegal_transition_is_rejected() {
        let (store, _temp) = create_test_store();
        store.insert(&create_test_request("pr_1", 1_000)).unwrap();

        let err = store
            .compare_and_set_status("pr_1", PrintRequestStatus::Pending, PrintRequestStatus::Dispatched)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn test_compare_and_set_all_is_all_or_nothing() {
        let (store, _temp) = create_test_store();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            store.insert(&create_test_request(id, i as i64)).unwrap();
            store.claim_for_batch(id, "batch").await.unwrap();
        }
        // "c" drifts out of BATCHED, so the whole set must stay put
        store
            .mark_failed("c", PrintRequestStatus::Batched, "photo missing")
            .await
            .unwrap();

        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let applied = store
            .compare_and_set_all(&ids, PrintRequestStatus::Batched, PrintRequestStatus::Dispatched)
            .await
            .unwrap();

        assert!(!applied);
        assert_eq!(store.get("a").await.unwrap().unwrap().status, PrintRequestStatus::Batched);
        assert_eq!(store.get("b").await.unwrap().unwrap().status, PrintRequestStatus::Batched);

        let failed = store.get("c").await.unwrap().unwrap();
        assert_eq!(failed.status, PrintRequestStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("photo missing"));
    }

    #[tokio::test]
    async fn test_lease_excludes_other_owners_until_expiry() {
        let (store, _temp) = create_test_store();
        let now = Utc.with_ymd_and_hms(2023, 2, 4, 9, 0, 0).unwrap();
        let ttl = Duration::from_secs(60);

        assert!(store.try_acquire_at("job", "a", ttl, now).unwrap());
        assert!(!store.try_acquire_at("job", "b", ttl, now).unwrap());
        // re-entrant for the same owner
        assert!(store.try_acquire_at("job", "a", ttl, now).unwrap());

        let later = now + chrono::Duration::seconds(61);
        assert!(store.try_acquire_at("job", "b", ttl, later).unwrap());
        assert_eq!(store.current_lease("job").unwrap().unwrap().owner, "b");
    }

    #[tokio::test]
    async fn test_release_only_by_owner() {
        let (store, _temp) = create_test_store();
        let ttl = Duration::from_secs(60);

        assert!(store.try_acquire("job", "a", ttl).await.unwrap());
        assert!(!store.release("job", "b").await.unwrap());
        assert!(store.release("job", "a").await.unwrap());
        assert!(store.current_lease("job").unwrap().is_none());
        assert!(store.try_acquire("job", "b", ttl).await.unwrap());
    }

    #[test]
    fn test_status_counts() {
        let (store, _temp) = create_test_store();
        store.insert(&create_test_request("a", 1)).unwrap();
        store.insert(&create_test_request("b", 2)).unwrap();

        let counts = store.status_counts().unwrap();
        assert_eq!(counts[&PrintRequestStatus::Pending], 2);
        assert_eq!(counts[&PrintRequestStatus::Dispatched], 0);
    }
}
