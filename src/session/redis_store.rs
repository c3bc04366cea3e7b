//! Redis-backed [`SessionStore`], gated behind the `redis-store` feature for
//! deployments that run more than one gateway instance against shared sessions
//! (§4.6, §1 Non-goals: sessions are the one piece of state shared across instances).

use super::store::{Session, SessionStore};
use crate::error::GatewayError;
use async_trait::async_trait;
use redis::AsyncCommands;

pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    pub fn new(redis_url: &str) -> Result<Self, GatewayError> {
        let client = redis::Client::open(redis_url).map_err(|e| GatewayError::SessionStore(e.to_string()))?;
        Ok(RedisSessionStore { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, GatewayError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| GatewayError::SessionStore(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, session: &Session) -> Result<(), GatewayError> {
        let mut conn = self.connection().await?;
        let key = Session::storage_key(&session.id);
        let payload = serde_json::to_string(session).map_err(|e| GatewayError::SessionStore(e.to_string()))?;
        let ttl = (session.expires_at - chrono::Utc::now()).num_seconds().max(1) as u64;
        conn.set_ex::<_, _, ()>(&key, payload, ttl)
            .await
            .map_err(|e| GatewayError::SessionStore(e.to_string()))
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, GatewayError> {
        let mut conn = self.connection().await?;
        let key = Session::storage_key(session_id);
        let raw: Option<String> =
            conn.get(&key).await.map_err(|e| GatewayError::SessionStore(e.to_string()))?;
        match raw {
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| GatewayError::SessionStore(e.to_string())),
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool, GatewayError> {
        let mut conn = self.connection().await?;
        let key = Session::storage_key(session_id);
        let removed: u64 = conn.del(&key).await.map_err(|e| GatewayError::SessionStore(e.to_string()))?;
        Ok(removed > 0)
    }

    async fn exists(&self, session_id: &str) -> Result<bool, GatewayError> {
        let mut conn = self.connection().await?;
        let key = Session::storage_key(session_id);
        conn.exists(&key).await.map_err(|e| GatewayError::SessionStore(e.to_string()))
    }
}
