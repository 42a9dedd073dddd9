// Local-first reconciliation: ingest pipeline, pending queue, flush scheduling

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::backend_client::{Delivery, SyncTransport};
use crate::domain::mapping::{NormalizedObservation, normalize, strip_fragment};
use crate::domain::models::{AuthSession, Observation, ProgressEntry, progress_key};
use crate::store::LocalStore;

/// Everything the reconciliation loop mutates, behind one lock: the pending
/// queue (keys dirtied since the last successful flush), the auth session
/// and the last-sync timestamp. The queue is in-memory only: a restart
/// loses at most one unflushed batch, while the local store keeps every
/// entry.
#[derive(Default)]
struct SyncState {
    pending: HashMap<String, ProgressEntry>,
    session: AuthSession,
    last_sync_at: Option<DateTime<Utc>>,
}

pub struct SyncEngine {
    store: LocalStore,
    state: Mutex<SyncState>,
}

/// What one scheduler tick did, for logs and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Queue was empty, nothing to do.
    Idle,
    /// No backend endpoint configured; this many pending entries were dropped.
    DroppedUnconfigured(usize),
    /// Batch accepted; this many keys left the queue (re-dirtied keys stay).
    Flushed(usize),
    /// Credentials rejected; session and queue cleared.
    Unauthorized,
    /// Transient failure; queue retained for the next tick.
    Deferred,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub pending: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub authenticated: bool,
}

/// Lookup data the UI needs to resume playback in a matching context.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeTarget {
    pub key: String,
    pub title: String,
    pub url: String,
    pub time: f64,
}

impl SyncEngine {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            state: Mutex::new(SyncState::default()),
        }
    }

    /// Ingest one observation for the active user. Returns whether it was
    /// accepted; a missing title drops it without error. The prior entry's
    /// `liked` flag survives the replacement.
    pub async fn ingest(&self, obs: &Observation) -> anyhow::Result<bool> {
        let user_id = {
            let state = self.state.lock().await;
            state.session.user_id().to_string()
        };
        let now_ms = Utc::now().timestamp_millis();
        let Some(NormalizedObservation { key, mut entry }) = normalize(obs, &user_id, now_ms)
        else {
            tracing::debug!(platform = obs.platform.as_deref().unwrap_or(""), "dropping observation without title");
            return Ok(false);
        };
        if let Some(prior) = self.store.get(&key).await? {
            entry.liked = prior.liked;
        }
        self.store.upsert(&key, &user_id, &entry).await?;
        let mut state = self.state.lock().await;
        state.pending.insert(key, entry);
        Ok(true)
    }

    /// Flip the stored like flag for the active user's entry. Only the local
    /// store changes; the flag reaches the backend with the next observation
    /// for the same key.
    pub async fn toggle_like(
        &self,
        platform: &str,
        title: &str,
    ) -> anyhow::Result<Option<(String, ProgressEntry)>> {
        let user_id = {
            let state = self.state.lock().await;
            state.session.user_id().to_string()
        };
        let key = progress_key(&user_id, platform, title);
        let Some(current) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let updated = self.store.set_liked(&key, !current.liked).await?;
        Ok(updated.map(|entry| (key, entry)))
    }

    /// Full local store contents, un-mutated, most recent first.
    pub async fn export(&self) -> anyhow::Result<Vec<(String, ProgressEntry)>> {
        self.store.all().await
    }

    /// Find the stored entry whose URL (fragment stripped) prefixes the
    /// given context URL; ties go to the most recently updated entry.
    pub async fn resume_target(&self, current_url: &str) -> anyhow::Result<Option<ResumeTarget>> {
        let wanted = strip_fragment(current_url);
        let mut best: Option<(String, ProgressEntry)> = None;
        for (key, entry) in self.store.all().await? {
            if entry.url.is_empty() || !wanted.starts_with(strip_fragment(&entry.url)) {
                continue;
            }
            match &best {
                Some((_, b)) if b.last_updated >= entry.last_updated => {}
                _ => best = Some((key, entry)),
            }
        }
        Ok(best.map(|(key, entry)| ResumeTarget {
            key,
            title: entry.title,
            url: entry.url,
            time: entry.time,
        }))
    }

    pub async fn set_session(&self, token: &str, user_id: &str) {
        let mut state = self.state.lock().await;
        state.session.set(token, user_id);
        tracing::info!(user_id, "session established");
    }

    pub async fn clear_session(&self) {
        let mut state = self.state.lock().await;
        state.session.clear();
        tracing::info!("session cleared");
    }

    pub async fn session_user(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.session.get().map(|c| c.user_id.clone())
    }

    pub async fn status(&self) -> SyncStatus {
        let state = self.state.lock().await;
        SyncStatus {
            pending: state.pending.len(),
            last_sync_at: state.last_sync_at,
            authenticated: state.session.get().is_some(),
        }
    }

    /// One reconciliation tick. Snapshots the queue and token, releases the
    /// lock across the network call, then applies exactly one outcome:
    /// accepted batches clear only the snapshot keys that were not re-dirtied
    /// mid-flight, a 401 clears session and queue together, and anything else
    /// leaves the queue for the next tick.
    pub async fn flush_tick(&self, transport: Option<&dyn SyncTransport>) -> FlushOutcome {
        {
            let state = self.state.lock().await;
            if state.pending.is_empty() {
                return FlushOutcome::Idle;
            }
        }
        let Some(transport) = transport else {
            let mut state = self.state.lock().await;
            let dropped = state.pending.len();
            state.pending.clear();
            tracing::warn!(dropped, "no backend endpoint configured, dropping pending entries");
            return FlushOutcome::DroppedUnconfigured(dropped);
        };

        let (snapshot, token) = {
            let state = self.state.lock().await;
            let snapshot: Vec<(String, ProgressEntry)> = state
                .pending
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (snapshot, state.session.token().map(str::to_string))
        };
        let items: Vec<ProgressEntry> = snapshot.iter().map(|(_, e)| e.clone()).collect();

        match transport.deliver(&items, token.as_deref()).await {
            Ok(Delivery::Accepted(ack)) => {
                let mut state = self.state.lock().await;
                let mut cleared = 0;
                for (key, sent) in &snapshot {
                    if state.pending.get(key) == Some(sent) {
                        state.pending.remove(key);
                        cleared += 1;
                    }
                }
                state.last_sync_at = Some(Utc::now());
                tracing::info!(
                    sent = items.len(),
                    stored = ack.stored,
                    still_pending = state.pending.len(),
                    "sync batch accepted"
                );
                FlushOutcome::Flushed(cleared)
            }
            Ok(Delivery::Unauthorized) => {
                let mut state = self.state.lock().await;
                state.session.clear();
                state.pending.clear();
                tracing::warn!("backend rejected credentials, cleared session and pending queue");
                FlushOutcome::Unauthorized
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:?}", e), "sync flush failed, will retry next tick");
                FlushOutcome::Deferred
            }
        }
    }
}

/// Drive the engine on a fixed period. Each flush runs to completion before
/// the next tick fires, so a slow flush delays the schedule instead of
/// overlapping it.
pub async fn run_scheduler(
    engine: Arc<SyncEngine>,
    transport: Option<Arc<dyn SyncTransport>>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        engine.flush_tick(transport.as_deref()).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use migration::MigratorTrait;
    use sea_orm::Database;

    use crate::backend_client::SyncAck;
    use crate::domain::models::progress_key;

    use super::*;

    async fn memory_engine() -> Arc<SyncEngine> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Arc::new(SyncEngine::new(LocalStore::new(db)))
    }

    fn observation(title: &str, time: f64) -> Observation {
        Observation {
            title: title.into(),
            episode: Some("1".into()),
            time: Some(time),
            duration: Some(1400.0),
            url: Some(format!("https://x.example/watch/{}", title)),
            platform: Some("X".into()),
            ..Default::default()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum RemoteMode {
        Accept,
        Reject,
        Fail,
    }

    /// Fake remote store honoring the backend contract: upsert by
    /// `platform:title`, so repeated delivery of the same item is a safe
    /// overwrite.
    struct FakeRemote {
        mode: StdMutex<RemoteMode>,
        stored: StdMutex<HashMap<String, ProgressEntry>>,
        /// When set, ingested into the engine mid-delivery to simulate an
        /// observation racing an in-flight flush.
        mid_flight: StdMutex<Option<(Arc<SyncEngine>, Observation)>>,
    }

    impl FakeRemote {
        fn new(mode: RemoteMode) -> Self {
            Self {
                mode: StdMutex::new(mode),
                stored: StdMutex::new(HashMap::new()),
                mid_flight: StdMutex::new(None),
            }
        }

        fn set_mode(&self, mode: RemoteMode) {
            *self.mode.lock().unwrap() = mode;
        }

        fn stored_snapshot(&self) -> HashMap<String, ProgressEntry> {
            self.stored.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl SyncTransport for FakeRemote {
        async fn deliver(
            &self,
            items: &[ProgressEntry],
            _token: Option<&str>,
        ) -> anyhow::Result<Delivery> {
            let race = self.mid_flight.lock().unwrap().take();
            if let Some((engine, obs)) = race {
                engine.ingest(&obs).await.unwrap();
            }
            let mode = *self.mode.lock().unwrap();
            match mode {
                RemoteMode::Accept => {
                    let mut stored = self.stored.lock().unwrap();
                    for item in items {
                        let key = format!("{}:{}", item.platform, item.title);
                        stored.insert(key, item.clone());
                    }
                    Ok(Delivery::Accepted(SyncAck {
                        ok: true,
                        stored: items.len() as i64,
                    }))
                }
                RemoteMode::Reject => Ok(Delivery::Unauthorized),
                RemoteMode::Fail => anyhow::bail!("connection refused"),
            }
        }
    }

    #[tokio::test]
    async fn like_survives_reingestion() {
        let engine = memory_engine().await;

        assert!(engine.ingest(&observation("Show A", 120.0)).await.unwrap());
        let (key, entry) = engine.export().await.unwrap().remove(0);
        assert_eq!(key, "local:X:Show A");
        assert_eq!(entry.time, 120.0);
        assert!(!entry.liked);

        // Second observation replaces everything except the flag.
        let second = Observation {
            title: "Show A".into(),
            time: Some(300.0),
            platform: Some("X".into()),
            ..Default::default()
        };
        assert!(engine.ingest(&second).await.unwrap());
        let (_, entry) = engine.export().await.unwrap().remove(0);
        assert_eq!(entry.time, 300.0);
        assert_eq!(entry.episode, "");
        assert!(!entry.liked);

        let (_, liked) = engine.toggle_like("X", "Show A").await.unwrap().unwrap();
        assert!(liked.liked);

        assert!(engine.ingest(&observation("Show A", 310.0)).await.unwrap());
        let (_, entry) = engine.export().await.unwrap().remove(0);
        assert_eq!(entry.time, 310.0);
        assert!(entry.liked);
    }

    #[tokio::test]
    async fn missing_title_never_touches_state() {
        let engine = memory_engine().await;
        let obs = Observation {
            time: Some(120.0),
            platform: Some("X".into()),
            ..Default::default()
        };
        assert!(!engine.ingest(&obs).await.unwrap());
        assert!(engine.export().await.unwrap().is_empty());
        assert_eq!(engine.status().await.pending, 0);
    }

    #[tokio::test]
    async fn unconfigured_backend_drops_queue_but_not_store() {
        let engine = memory_engine().await;
        for title in ["A", "B", "C"] {
            engine.ingest(&observation(title, 1.0)).await.unwrap();
        }
        assert_eq!(engine.status().await.pending, 3);

        assert_eq!(
            engine.flush_tick(None).await,
            FlushOutcome::DroppedUnconfigured(3)
        );
        assert_eq!(engine.status().await.pending, 0);
        assert_eq!(engine.export().await.unwrap().len(), 3);
        assert_eq!(engine.flush_tick(None).await, FlushOutcome::Idle);
    }

    #[tokio::test]
    async fn unauthorized_clears_session_and_queue() {
        let engine = memory_engine().await;
        engine.set_session("tok", "google:123").await;
        engine.ingest(&observation("Show A", 120.0)).await.unwrap();

        let remote = FakeRemote::new(RemoteMode::Reject);
        assert_eq!(
            engine.flush_tick(Some(&remote)).await,
            FlushOutcome::Unauthorized
        );

        let status = engine.status().await;
        assert_eq!(status.pending, 0);
        assert!(!status.authenticated);
        assert!(engine.session_user().await.is_none());
        assert!(remote.stored_snapshot().is_empty());
    }

    #[tokio::test]
    async fn transient_failure_retains_queue_exactly() {
        let engine = memory_engine().await;
        engine.ingest(&observation("Show A", 120.0)).await.unwrap();
        engine.ingest(&observation("Show B", 45.0)).await.unwrap();
        let before = engine.status().await.pending;

        let remote = FakeRemote::new(RemoteMode::Fail);
        assert_eq!(engine.flush_tick(Some(&remote)).await, FlushOutcome::Deferred);
        assert_eq!(engine.status().await.pending, before);
        assert!(remote.stored_snapshot().is_empty());
        assert!(engine.status().await.last_sync_at.is_none());

        // Next tick retries the same batch and succeeds.
        remote.set_mode(RemoteMode::Accept);
        assert_eq!(engine.flush_tick(Some(&remote)).await, FlushOutcome::Flushed(2));
        assert_eq!(engine.status().await.pending, 0);
        assert_eq!(remote.stored_snapshot().len(), 2);
        assert!(engine.status().await.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn repeated_delivery_is_idempotent() {
        let engine = memory_engine().await;
        engine.ingest(&observation("Show A", 120.0)).await.unwrap();

        let remote = FakeRemote::new(RemoteMode::Accept);
        assert_eq!(engine.flush_tick(Some(&remote)).await, FlushOutcome::Flushed(1));
        let after_once = remote.stored_snapshot();

        // Deliver the identical batch again, as an unconditional retry would.
        let items: Vec<ProgressEntry> = after_once.values().cloned().collect();
        remote.deliver(&items, None).await.unwrap();
        assert_eq!(remote.stored_snapshot(), after_once);
        assert_eq!(remote.stored_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn ingest_racing_a_flush_is_not_lost() {
        let engine = memory_engine().await;
        engine.ingest(&observation("Show A", 120.0)).await.unwrap();

        let remote = FakeRemote::new(RemoteMode::Accept);
        *remote.mid_flight.lock().unwrap() =
            Some((engine.clone(), observation("Show A", 300.0)));

        // The mid-flight ingest re-dirties the key, so the accepted flush
        // must not clear it.
        assert_eq!(engine.flush_tick(Some(&remote)).await, FlushOutcome::Flushed(0));
        assert_eq!(engine.status().await.pending, 1);
        assert_eq!(remote.stored_snapshot()["X:Show A"].time, 120.0);

        assert_eq!(engine.flush_tick(Some(&remote)).await, FlushOutcome::Flushed(1));
        assert_eq!(engine.status().await.pending, 0);
        assert_eq!(remote.stored_snapshot()["X:Show A"].time, 300.0);
    }

    #[tokio::test]
    async fn entries_key_under_session_user() {
        let engine = memory_engine().await;
        engine.set_session("tok", "google:123").await;
        engine.ingest(&observation("Show A", 120.0)).await.unwrap();

        let (key, _) = engine.export().await.unwrap().remove(0);
        assert_eq!(key, progress_key("google:123", "X", "Show A"));
    }

    #[tokio::test]
    async fn resume_target_prefix_match_ignores_fragments() {
        let engine = memory_engine().await;
        let mut obs = observation("Show A", 120.0);
        obs.url = Some("https://x.example/watch/1#t=0".into());
        engine.ingest(&obs).await.unwrap();

        let target = engine
            .resume_target("https://x.example/watch/1#resume")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.time, 120.0);
        assert_eq!(target.title, "Show A");

        assert!(engine
            .resume_target("https://other.example/watch/1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn resume_target_prefers_most_recent() {
        let engine = memory_engine().await;
        let mut older = observation("Show A", 100.0);
        older.url = Some("https://x.example/watch".into());
        engine.ingest(&older).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        let mut newer = observation("Show B", 200.0);
        newer.url = Some("https://x.example/watch/2".into());
        engine.ingest(&newer).await.unwrap();

        let target = engine
            .resume_target("https://x.example/watch/2?lang=en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.title, "Show B");
    }
}
