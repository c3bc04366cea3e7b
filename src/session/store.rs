//! TTL key-value session store (§4.6, §6 persisted-state layout: key `session:{id}`).
//!
//! The default backend is an in-process `DashMap`, matching the "in-memory by
//! default, pluggable backend" posture already used for the rate limiter; a
//! Redis-backed implementation of the same trait lives behind the `redis-store`
//! feature for multi-instance deployments.

use crate::error::GatewayError;
use crate::messages::{Context, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub context: Context,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(ttl_seconds: u64, context: Context) -> Self {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            context,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_seconds as i64),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn storage_key(id: &str) -> String {
        format!("session:{id}")
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> Result<(), GatewayError>;
    async fn get(&self, session_id: &str) -> Result<Option<Session>, GatewayError>;
    async fn delete(&self, session_id: &str) -> Result<bool, GatewayError>;
    async fn exists(&self, session_id: &str) -> Result<bool, GatewayError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        InMemorySessionStore::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), GatewayError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, GatewayError> {
        match self.sessions.get(session_id) {
            Some(session) if session.is_expired() => {
                drop(session);
                self.sessions.remove(session_id);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool, GatewayError> {
        Ok(self.sessions.remove(session_id).is_some())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, GatewayError> {
        Ok(self.get(session_id).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let store = InMemorySessionStore::new();
        let session = Session::new(3600, Context::new());
        store.save(&session).await.unwrap();

        let fetched = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, session.id);
        assert_eq!(fetched.messages.len(), session.messages.len());
    }

    #[tokio::test]
    async fn delete_of_unknown_session_is_noop() {
        let store = InMemorySessionStore::new();
        assert!(!store.delete("does-not-exist").await.unwrap());
    }

    #[tokio::test]
    async fn expired_session_reads_as_miss() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new(3600, Context::new());
        session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.save(&session).await.unwrap();

        assert!(store.get(&session.id).await.unwrap().is_none());
    }
}
