use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Viewer id -> last heartbeat. Entries older than the TTL are swept on every access, so no
/// cleanup task is needed.
pub struct ViewerPresenceTracker {
    ttl: Duration,
    viewers: Arc<RwLock<HashMap<String, Instant>>>,
}

impl ViewerPresenceTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            viewers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Records (or refreshes) a heartbeat and returns the live count.
    pub async fn heartbeat(&self, viewer_id: &str) -> usize {
        let now = Instant::now();
        let mut viewers = self.viewers.write().await;
        Self::sweep(&mut viewers, now, self.ttl);
        viewers.insert(viewer_id.to_string(), now);
        viewers.len()
    }

    pub async fn count(&self) -> usize {
        let mut viewers = self.viewers.write().await;
        Self::sweep(&mut viewers, Instant::now(), self.ttl);
        viewers.len()
    }

    fn sweep(viewers: &mut HashMap<String, Instant>, now: Instant, ttl: Duration) {
        let before = viewers.len();
        viewers.retain(|_, last_seen| now.saturating_duration_since(*last_seen) <= ttl);
        let expired = before - viewers.len();
        if expired > 0 {
            tracing::debug!("Expired {} viewer(s)", expired);
        }
    }
}

impl Clone for ViewerPresenceTracker {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            viewers: Arc::clone(&self.viewers),
        }
    }
}
