//! In-memory artifact store backed by a papaya lock-free HashMap.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use talisman_storage::{
    ArtifactKind, ArtifactStore, DynArtifactStore, IndexedFields, StorageAdapter, StorageResult,
    payload_fields,
};

use crate::clock::{Clock, SystemClock};

/// One stored artifact with its derived index columns.
#[derive(Debug, Clone)]
struct MemoryRecord {
    kind: ArtifactKind,
    payload: Value,
    grant_id: Option<String>,
    uid: Option<String>,
    user_code: Option<String>,
    expires_at: Option<OffsetDateTime>,
    consumed_at: Option<OffsetDateTime>,
    /// Insertion sequence, the tie-break for first-by-storage-order lookups.
    seq: u64,
}

impl MemoryRecord {
    fn is_visible(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug)]
struct Shared {
    data: PapayaHashMap<String, MemoryRecord>,
    seq: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// First visible record matching `pred`, by insertion order.
    fn find_first<F>(&self, pred: F) -> Option<Value>
    where
        F: Fn(&MemoryRecord) -> bool,
    {
        let now = self.clock.now();
        let guard = self.data.pin();
        guard
            .iter()
            .filter(|(_, rec)| rec.is_visible(now) && pred(rec))
            .min_by_key(|(_, rec)| rec.seq)
            .map(|(_, rec)| rec.payload.clone())
    }
}

/// In-memory storage adapter.
///
/// Holds the shared artifact map and hands out kind-scoped store handles
/// over it. Construction needs no warm-up; the adapter is ready as soon as
/// it exists.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    shared: Arc<Shared>,
}

impl MemoryAdapter {
    /// Creates a new adapter on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a new adapter with the given time source.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                data: PapayaHashMap::new(),
                seq: AtomicU64::new(0),
                clock,
            }),
        }
    }

    /// Number of records currently held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.data.pin().iter().count()
    }

    /// Returns `true` if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn store(&self, kind: ArtifactKind) -> DynArtifactStore {
        Arc::new(MemoryStore {
            kind,
            shared: Arc::clone(&self.shared),
        })
    }

    async fn purge_expired(&self) -> StorageResult<u64> {
        let now = self.shared.clock.now();
        let guard = self.shared.data.pin();

        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, rec)| !rec.is_visible(now))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            guard.remove(id);
        }

        debug!(purged = expired.len(), "Purged expired artifacts");
        Ok(expired.len() as u64)
    }

    async fn shutdown(&self) {
        let guard = self.shared.data.pin();
        let ids: Vec<String> = guard.iter().map(|(id, _)| id.clone()).collect();
        for id in &ids {
            guard.remove(id);
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Kind-scoped handle over the shared in-memory map.
struct MemoryStore {
    kind: ArtifactKind,
    shared: Arc<Shared>,
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    async fn find(&self, id: &str) -> StorageResult<Option<Value>> {
        let now = self.shared.clock.now();
        let guard = self.shared.data.pin();
        Ok(guard
            .get(id)
            .filter(|rec| rec.is_visible(now))
            .map(|rec| rec.payload.clone()))
    }

    async fn find_by_uid(&self, uid: &str) -> StorageResult<Option<Value>> {
        Ok(self
            .shared
            .find_first(|rec| rec.uid.as_deref() == Some(uid)))
    }

    async fn find_by_user_code(&self, user_code: &str) -> StorageResult<Option<Value>> {
        Ok(self
            .shared
            .find_first(|rec| rec.user_code.as_deref() == Some(user_code)))
    }

    async fn upsert(
        &self,
        id: &str,
        payload: &Value,
        expires_in: Option<u64>,
    ) -> StorageResult<()> {
        let fields = IndexedFields::extract(self.kind, payload);
        let now = self.shared.clock.now();
        let expires_at =
            expires_in.map(|secs| now + Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));

        let guard = self.shared.data.pin();

        // A replaced record keeps its kind, consumption stamp, and storage
        // order; only the payload and derived columns are rewritten.
        let (kind, consumed_at, seq) = match guard.get(id) {
            Some(prior) => (prior.kind, prior.consumed_at, prior.seq),
            None => (self.kind, None, self.shared.next_seq()),
        };

        guard.insert(
            id.to_string(),
            MemoryRecord {
                kind,
                payload: payload.clone(),
                grant_id: fields.grant_id,
                uid: fields.uid,
                user_code: fields.user_code,
                expires_at,
                consumed_at,
                seq,
            },
        );

        Ok(())
    }

    async fn consume(&self, id: &str) -> StorageResult<()> {
        let now = self.shared.clock.now();
        let guard = self.shared.data.pin();

        if let Some(rec) = guard.get(id)
            && rec.consumed_at.is_none()
        {
            let mut updated = rec.clone();
            if let Value::Object(map) = &mut updated.payload {
                map.insert(
                    payload_fields::CONSUMED.to_string(),
                    Value::from(now.unix_timestamp()),
                );
            }
            updated.consumed_at = Some(now);
            guard.insert(id.to_string(), updated);
        }

        Ok(())
    }

    async fn destroy(&self, id: &str) -> StorageResult<()> {
        self.shared.data.pin().remove(id);
        Ok(())
    }

    async fn destroy_by_grant(&self, grant_id: &str) -> StorageResult<()> {
        let guard = self.shared.data.pin();

        let members: Vec<String> = guard
            .iter()
            .filter(|(_, rec)| rec.grant_id.as_deref() == Some(grant_id))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &members {
            guard.remove(id);
        }

        Ok(())
    }

    async fn find_client_by_jwks_uri(&self, jwks_uri: &str) -> StorageResult<Option<Value>> {
        Ok(self.shared.find_first(|rec| {
            rec.kind == ArtifactKind::Client
                && rec
                    .payload
                    .get(payload_fields::JWKS_URI)
                    .and_then(Value::as_str)
                    == Some(jwks_uri)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use time::macros::datetime;

    /// Clock whose current time is advanced by hand.
    #[derive(Debug)]
    struct TestClock {
        now: Mutex<OffsetDateTime>,
    }

    impl TestClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(datetime!(2024-01-01 00:00:00 UTC)),
            })
        }

        fn advance(&self, secs: i64) {
            *self.now.lock().unwrap() += Duration::seconds(secs);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> OffsetDateTime {
            *self.now.lock().unwrap()
        }
    }

    fn adapter_with_clock() -> (MemoryAdapter, Arc<TestClock>) {
        let clock = TestClock::new();
        (MemoryAdapter::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_upsert_and_find_round_trip() {
        let (adapter, _clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::AccessToken);

        let payload = json!({
            "grantId": "grant-1",
            "scope": "openid profile",
            "claims": { "sub": "user-7", "nested": { "deep": [1, 2, 3] } },
        });

        store.upsert("tok-1", &payload, None).await.unwrap();

        let found = store.find("tok-1").await.unwrap().unwrap();
        assert_eq!(found, payload);
        assert!(store.find("tok-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let (adapter, clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::Client);

        store.upsert("c-1", &json!({"name": "app"}), None).await.unwrap();

        clock.advance(10 * 365 * 24 * 3600);
        assert!(store.find("c-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ttl_expiry_boundary() {
        let (adapter, clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::AuthorizationCode);

        store.upsert("code-1", &json!({"v": 1}), Some(60)).await.unwrap();

        clock.advance(59);
        assert!(store.find("code-1").await.unwrap().is_some());

        // Exactly at insert_time + ttl the record is no longer visible.
        clock.advance(1);
        assert!(store.find("code-1").await.unwrap().is_none());

        // The record still physically exists until purged.
        assert_eq!(adapter.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_full() {
        let (adapter, _clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::DeviceCode);

        let first = json!({"userCode": "AAAA-1111", "grantId": "g1", "extra": true});
        let second = json!({"userCode": "BBBB-2222"});

        store.upsert("dc-1", &first, Some(600)).await.unwrap();
        store.upsert("dc-1", &second, Some(600)).await.unwrap();

        assert_eq!(adapter.len(), 1);
        assert_eq!(store.find("dc-1").await.unwrap().unwrap(), second);

        // Derived columns were rewritten along with the payload.
        assert!(store.find_by_user_code("AAAA-1111").await.unwrap().is_none());
        assert!(store.find_by_user_code("BBBB-2222").await.unwrap().is_some());
        store.destroy_by_grant("g1").await.unwrap();
        assert!(store.find("dc-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upsert_can_clear_expiry() {
        let (adapter, clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::Session);

        store.upsert("s-1", &json!({"uid": "u1"}), Some(30)).await.unwrap();
        store.upsert("s-1", &json!({"uid": "u1"}), None).await.unwrap();

        clock.advance(3600);
        assert!(store.find("s-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_consume_marks_payload_and_is_idempotent() {
        let (adapter, clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::AuthorizationCode);

        let payload = json!({"grantId": "g1", "redirectUri": "https://rp/cb"});
        store.upsert("code-1", &payload, Some(600)).await.unwrap();

        store.consume("code-1").await.unwrap();
        let consumed = store.find("code-1").await.unwrap().unwrap();

        let stamp = consumed[payload_fields::CONSUMED].as_i64().unwrap();
        assert_eq!(stamp, clock.now().unix_timestamp());
        // The rest of the payload is untouched.
        assert_eq!(consumed["redirectUri"], "https://rp/cb");
        assert_eq!(consumed["grantId"], "g1");

        // A later second consume does not re-stamp.
        clock.advance(42);
        store.consume("code-1").await.unwrap();
        let again = store.find("code-1").await.unwrap().unwrap();
        assert_eq!(again, consumed);
    }

    #[tokio::test]
    async fn test_consume_missing_id_is_noop() {
        let (adapter, _clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::AuthorizationCode);

        store.consume("ghost").await.unwrap();
        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn test_consume_does_not_change_visibility() {
        let (adapter, clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::DeviceCode);

        store
            .upsert("dc-1", &json!({"userCode": "ABCD-1234"}), Some(600))
            .await
            .unwrap();
        store.consume("dc-1").await.unwrap();

        // Still findable after consumption, including by secondary key.
        assert!(store.find("dc-1").await.unwrap().is_some());
        assert!(store.find_by_user_code("ABCD-1234").await.unwrap().is_some());

        clock.advance(600);
        assert!(store.find("dc-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_destroy_is_silent_on_missing() {
        let (adapter, _clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::Session);

        store.destroy("nope").await.unwrap();

        store.upsert("s-1", &json!({"uid": "u1"}), None).await.unwrap();
        store.destroy("s-1").await.unwrap();
        assert!(store.find("s-1").await.unwrap().is_none());
        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_by_grant_cascades_across_kinds() {
        let (adapter, _clock) = adapter_with_clock();
        let tokens = adapter.store(ArtifactKind::AccessToken);
        let codes = adapter.store(ArtifactKind::AuthorizationCode);
        let refresh = adapter.store(ArtifactKind::RefreshToken);

        tokens.upsert("at-1", &json!({"grantId": "g1"}), None).await.unwrap();
        codes.upsert("ac-1", &json!({"grantId": "g1"}), None).await.unwrap();
        refresh.upsert("rt-1", &json!({"grantId": "g2"}), None).await.unwrap();

        tokens.destroy_by_grant("g1").await.unwrap();

        assert!(tokens.find("at-1").await.unwrap().is_none());
        assert!(codes.find("ac-1").await.unwrap().is_none());
        // Records with a different grant are untouched.
        assert!(refresh.find("rt-1").await.unwrap().is_some());

        // No error when nothing matches.
        tokens.destroy_by_grant("g1").await.unwrap();
    }

    #[tokio::test]
    async fn test_secondary_lookups_never_return_expired() {
        let (adapter, clock) = adapter_with_clock();
        let sessions = adapter.store(ArtifactKind::Session);
        let devices = adapter.store(ArtifactKind::DeviceCode);

        sessions.upsert("s-1", &json!({"uid": "u1"}), Some(60)).await.unwrap();
        devices
            .upsert("dc-1", &json!({"userCode": "WXYZ-0000"}), Some(60))
            .await
            .unwrap();

        clock.advance(61);

        assert!(sessions.find_by_uid("u1").await.unwrap().is_none());
        assert!(devices.find_by_user_code("WXYZ-0000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_device_code_ttl_scenario() {
        let (adapter, clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::DeviceCode);

        let payload = json!({"userCode": "ABCD-1234", "grantId": "g9"});
        store.upsert("dc-9", &payload, Some(600)).await.unwrap();

        let found = store.find_by_user_code("ABCD-1234").await.unwrap().unwrap();
        assert_eq!(found, payload);

        clock.advance(601);
        assert!(store.find_by_user_code("ABCD-1234").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_secondary_lookup_first_by_storage_order() {
        let (adapter, _clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::Session);

        store.upsert("s-old", &json!({"uid": "shared", "n": 1}), None).await.unwrap();
        store.upsert("s-new", &json!({"uid": "shared", "n": 2}), None).await.unwrap();

        let found = store.find_by_uid("shared").await.unwrap().unwrap();
        assert_eq!(found["n"], 1);

        // Once the first is gone the later record is returned.
        store.destroy("s-old").await.unwrap();
        let found = store.find_by_uid("shared").await.unwrap().unwrap();
        assert_eq!(found["n"], 2);
    }

    #[tokio::test]
    async fn test_find_client_by_jwks_uri() {
        let (adapter, _clock) = adapter_with_clock();
        let clients = adapter.store(ArtifactKind::Client);
        let sessions = adapter.store(ArtifactKind::Session);

        clients
            .upsert("c-1", &json!({"jwks_uri": "https://issuer/jwks", "name": "one"}), None)
            .await
            .unwrap();
        clients
            .upsert("c-2", &json!({"jwks_uri": "https://other/jwks", "name": "two"}), None)
            .await
            .unwrap();
        // A non-client payload with a matching field is never returned.
        sessions
            .upsert("s-1", &json!({"jwks_uri": "https://issuer/jwks"}), None)
            .await
            .unwrap();

        let found = clients
            .find_client_by_jwks_uri("https://issuer/jwks")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["name"], "one");

        assert!(
            clients
                .find_client_by_jwks_uri("https://missing/jwks")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_upsert_preserves_consumption_stamp() {
        let (adapter, _clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::AuthorizationCode);

        store.upsert("code-1", &json!({"v": 1}), Some(600)).await.unwrap();
        store.consume("code-1").await.unwrap();
        store.upsert("code-1", &json!({"v": 2}), Some(600)).await.unwrap();

        // The payload is replaced in full; the consumption stamp on the
        // record survives, so a retried consume stays a no-op.
        store.consume("code-1").await.unwrap();
        let found = store.find("code-1").await.unwrap().unwrap();
        assert_eq!(found, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_purge_expired_removes_only_expired() {
        let (adapter, clock) = adapter_with_clock();
        let store = adapter.store(ArtifactKind::AccessToken);

        store.upsert("keep", &json!({"v": 1}), None).await.unwrap();
        store.upsert("short", &json!({"v": 2}), Some(10)).await.unwrap();
        store.upsert("long", &json!({"v": 3}), Some(1000)).await.unwrap();

        clock.advance(11);

        let purged = adapter.purge_expired().await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(adapter.len(), 2);
        assert!(store.find("keep").await.unwrap().is_some());
        assert!(store.find("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_distinct_ids() {
        use tokio::task::JoinSet;

        let adapter = MemoryAdapter::new();
        let mut join_set = JoinSet::new();

        for i in 0..50 {
            let store = adapter.store(ArtifactKind::AccessToken);
            join_set.spawn(async move {
                let id = format!("tok-{i}");
                store.upsert(&id, &json!({"n": i}), None).await
            });
        }

        while let Some(result) = join_set.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(adapter.len(), 50);
    }

    #[tokio::test]
    async fn test_backend_name_and_kind() {
        let adapter = MemoryAdapter::new();
        assert_eq!(adapter.backend_name(), "memory");

        let store = adapter.store(ArtifactKind::ReplayDetection);
        assert_eq!(store.kind(), ArtifactKind::ReplayDetection);
    }

    #[tokio::test]
    async fn test_shutdown_clears_state() {
        let adapter = MemoryAdapter::new();
        let store = adapter.store(ArtifactKind::Session);

        store.upsert("s-1", &json!({"uid": "u"}), None).await.unwrap();
        adapter.shutdown().await;
        assert!(adapter.is_empty());
    }
}
