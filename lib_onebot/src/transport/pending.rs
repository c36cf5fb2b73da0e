use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;

/// One outstanding call. Completed at most once, by whoever removes it from
/// [`PendingCalls`] first.
#[derive(Debug)]
pub struct PendingCall {
    responder: oneshot::Sender<Value>,
    pub created: Instant,
    pub deadline: Instant,
}

impl PendingCall {
    /// Hands the response to the waiting caller. A caller that already gave
    /// up is ignored.
    pub fn complete(self, response: Value) {
        let _ = self.responder.send(response);
    }
}

/// Shared between call issuers (insert, remove on timeout) and the receive
/// loop (remove on response). Every removal goes through one lock, so exactly
/// one side wins.
#[derive(Debug, Default)]
pub struct PendingCalls {
    inner: Mutex<HashMap<String, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, echo: String, timeout: Duration) -> oneshot::Receiver<Value> {
        let (responder, rx) = oneshot::channel();
        let created = Instant::now();
        let call = PendingCall {
            responder,
            created,
            deadline: created + timeout,
        };
        self.lock().insert(echo, call);
        rx
    }

    fn take(&self, echo: &str) -> Option<PendingCall> {
        self.lock().remove(echo)
    }

    /// Completes the call registered under `echo`. When there is none (unknown
    /// id, or it already timed out) the frame is handed back.
    pub fn resolve(&self, echo: &str, response: Value) -> Option<Value> {
        match self.take(echo) {
            Some(call) => {
                call.complete(response);
                None
            }
            None => Some(response),
        }
    }

    pub fn remove(&self, echo: &str) -> bool {
        self.take(echo).is_some()
    }

    /// Number of calls still waiting.
    pub fn outstanding(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingCall>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolve_delivers_once() {
        let pending = PendingCalls::new();
        let rx = pending.register("a".into(), Duration::from_secs(1));
        assert_eq!(pending.outstanding(), 1);

        assert_eq!(pending.resolve("a", json!({"status": "ok"})), None);
        assert_eq!(
            pending.resolve("a", json!({"status": "late"})),
            Some(json!({"status": "late"}))
        );
        assert_eq!(rx.await.unwrap(), json!({"status": "ok"}));
        assert_eq!(pending.outstanding(), 0);
    }

    #[test]
    fn test_removed_call_drops_late_response() {
        let pending = PendingCalls::new();
        let _rx = pending.register("b".into(), Duration::from_millis(10));
        assert!(pending.remove("b"));
        assert!(pending.resolve("b", json!({})).is_some());
    }

    #[test]
    fn test_deadline_follows_timeout() {
        let pending = PendingCalls::new();
        let _rx = pending.register("c".into(), Duration::from_secs(30));
        let call = pending.take("c").unwrap();
        assert_eq!(call.deadline - call.created, Duration::from_secs(30));
    }

    #[test]
    fn test_complete_after_caller_left_is_harmless() {
        let pending = PendingCalls::new();
        let rx = pending.register("d".into(), Duration::from_secs(1));
        drop(rx);
        assert_eq!(pending.resolve("d", json!({})), None);
    }
}
