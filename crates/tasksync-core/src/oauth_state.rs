//! Short-lived state tokens for the OAuth connect flow.
//!
//! A token is issued when the user starts connecting a service and must come
//! back unchanged on the provider's callback. Each token is single-use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::Service;

/// What a state token stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConnection {
    pub user_id: String,
    pub service: Service,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    connection: PendingConnection,
    expires_at: Instant,
}

/// In-process store of pending OAuth connections keyed by opaque tokens
#[derive(Clone)]
pub struct OAuthStateStore {
    entries: Arc<Mutex<HashMap<String, PendingEntry>>>,
    ttl: Duration,
}

impl OAuthStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Register a pending connection and return its state token
    pub async fn issue(&self, user_id: &str, service: Service) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut guard = self.entries.lock().await;
        guard.retain(|_, entry| entry.expires_at > now);
        guard.insert(
            token.clone(),
            PendingEntry {
                connection: PendingConnection {
                    user_id: user_id.to_string(),
                    service,
                },
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// Take the pending connection for `token`.
    ///
    /// Returns `None` for unknown, already used, or expired tokens.
    pub async fn consume(&self, token: &str) -> Option<PendingConnection> {
        let now = Instant::now();
        let mut guard = self.entries.lock().await;
        let entry = guard.remove(token.trim());
        guard.retain(|_, entry| entry.expires_at > now);
        drop(guard);

        let entry = entry?;
        if entry.expires_at > now {
            Some(entry.connection)
        } else {
            tracing::debug!(service = %entry.connection.service, "Rejected expired OAuth state");
            None
        }
    }

    /// Number of tokens currently held, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
