//! In-memory session store with idle expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::crypto::session_id;
use crate::domain::UserId;

/// Value-bag key holding the owning user's id.
pub const USER_ID_KEY: &str = "userid";

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: UserId,
    pub last_touched: Instant,
    pub values: HashMap<String, String>,
}

impl Session {
    fn new(user_id: UserId) -> Self {
        let mut values = HashMap::new();
        values.insert(USER_ID_KEY.to_string(), user_id.to_string());

        Self {
            id: session_id(),
            user_id,
            last_touched: Instant::now(),
            values,
        }
    }

    fn expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_touched) > ttl
    }
}

pub struct SessionProvider {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionProvider {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn create(&self, user_id: UserId) -> Session {
        let session = Session::new(user_id);
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        session
    }

    /// Returns the session and advances its `last_touched`.
    ///
    /// A session idle past the TTL is dropped and reported as absent even if
    /// the sweeper has not reached it yet.
    pub async fn get(&self, sid: &str) -> Option<Session> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if sessions.get(sid)?.expired(now, self.ttl) {
            sessions.remove(sid);
            return None;
        }

        let session = sessions.get_mut(sid)?;
        session.last_touched = now;
        Some(session.clone())
    }

    /// Replaces `sid` with a fresh id bound to the same user and value bag.
    pub async fn renew(&self, sid: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let old = sessions.remove(sid)?;

        let mut renewed = Session::new(old.user_id);
        renewed.values = old.values;
        sessions.insert(renewed.id.clone(), renewed.clone());

        Some(renewed)
    }

    pub async fn remove(&self, sid: &str) -> bool {
        self.sessions.write().await.remove(sid).is_some()
    }

    pub async fn set_value(&self, sid: &str, key: &str, value: String) -> bool {
        match self.sessions.write().await.get_mut(sid) {
            Some(session) => {
                session.values.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    pub async fn find_by_value(&self, key: &str, value: &str) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.values.get(key).is_some_and(|v| v == value))
            .cloned()
            .collect()
    }

    /// Removes every session of `user_id` except `keep`. Returns the number removed.
    pub async fn revoke_other_sessions(&self, user_id: UserId, keep: &str) -> usize {
        let stale: Vec<String> = self
            .find_by_value(USER_ID_KEY, &user_id.to_string())
            .await
            .into_iter()
            .map(|s| s.id)
            .filter(|id| id != keep)
            .collect();

        let mut sessions = self.sessions.write().await;
        stale
            .iter()
            .filter(|id| sessions.remove(id.as_str()).is_some())
            .count()
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    async fn sweep_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.expired(now, self.ttl));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Runs [`Self::sweep`] every `interval` until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            info!(interval_secs = interval.as_secs(), "Session sweeper started");

            loop {
                ticker.tick().await;
                let removed = provider.sweep().await;
                if removed > 0 {
                    debug!(count = removed, "Swept idle sessions");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SessionProvider {
        SessionProvider::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn create_and_get() {
        let p = provider();
        let s = p.create(UserId::new(7)).await;

        assert_eq!(s.id.len(), 86);
        let got = p.get(&s.id).await.unwrap();
        assert_eq!(got.user_id, UserId::new(7));
        assert_eq!(got.values.get(USER_ID_KEY).map(String::as_str), Some("7"));
        assert!(p.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn get_advances_last_touched() {
        let p = provider();
        let s = p.create(UserId::new(1)).await;
        let before = s.last_touched;

        let got = p.get(&s.id).await.unwrap();
        assert!(got.last_touched >= before);
    }

    #[tokio::test]
    async fn renew_replaces_id_and_keeps_values() {
        let p = provider();
        let s = p.create(UserId::new(1)).await;
        assert!(p.set_value(&s.id, "theme", "dark".into()).await);

        let renewed = p.renew(&s.id).await.unwrap();
        assert_ne!(renewed.id, s.id);
        assert!(p.get(&s.id).await.is_none());
        assert_eq!(
            renewed.values.get("theme").map(String::as_str),
            Some("dark")
        );
        assert_eq!(p.len().await, 1);
    }

    #[tokio::test]
    async fn revoke_other_sessions_keeps_current() {
        let p = provider();
        let current = p.create(UserId::new(1)).await;
        p.create(UserId::new(1)).await;
        p.create(UserId::new(1)).await;
        let other_user = p.create(UserId::new(2)).await;

        assert_eq!(p.revoke_other_sessions(UserId::new(1), &current.id).await, 2);
        assert!(p.get(&current.id).await.is_some());
        assert!(p.get(&other_user.id).await.is_some());
        assert_eq!(p.find_by_value(USER_ID_KEY, "1").await.len(), 1);
    }

    #[tokio::test]
    async fn sweep_removes_idle_sessions() {
        let p = provider();
        let s = p.create(UserId::new(1)).await;

        assert_eq!(p.sweep().await, 0);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(p.sweep_at(later).await, 1);
        assert!(p.get(&s.id).await.is_none());
        assert!(p.is_empty().await);
    }

    #[tokio::test]
    async fn expired_session_is_not_returned() {
        let p = SessionProvider::new(Duration::ZERO);
        let s = p.create(UserId::new(1)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(p.get(&s.id).await.is_none());
        assert_eq!(p.len().await, 0);
    }

    #[tokio::test]
    async fn remove() {
        let p = provider();
        let s = p.create(UserId::new(1)).await;
        assert!(p.remove(&s.id).await);
        assert!(!p.remove(&s.id).await);
    }
}
