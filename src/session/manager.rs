//! Stateless service layer over a [`SessionStore`] (§4.6).

use super::store::{Session, SessionStore};
use crate::error::GatewayError;
use crate::messages::{Context, Message};
use std::sync::Arc;

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl_seconds: u64,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, ttl_seconds: u64) -> Self {
        SessionManager { store, ttl_seconds }
    }

    pub async fn create(&self, context: Option<Context>) -> Result<Session, GatewayError> {
        let session = Session::new(self.ttl_seconds, context.unwrap_or_default());
        self.store.save(&session).await?;
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Result<Session, GatewayError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::SessionNotFound(id.to_string()))
    }

    /// Idempotent: deleting an unknown session id is not an error.
    pub async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        self.store.delete(id).await?;
        Ok(())
    }

    pub async fn add_message(&self, id: &str, message: Message) -> Result<(), GatewayError> {
        let mut session = self.get(id).await?;
        session.messages.push(message);
        self.store.save(&session).await
    }

    pub async fn add_messages(&self, id: &str, messages: Vec<Message>) -> Result<(), GatewayError> {
        let mut session = self.get(id).await?;
        session.messages.extend(messages);
        self.store.save(&session).await
    }

    /// Merge semantics: new keys overwrite existing ones of the same name.
    pub async fn update_context(&self, id: &str, partial: Context) -> Result<(), GatewayError> {
        let mut session = self.get(id).await?;
        for (k, v) in partial {
            session.context.insert(k, v);
        }
        self.store.save(&session).await
    }

    pub async fn get_history(&self, id: &str) -> Result<Vec<Message>, GatewayError> {
        Ok(self.get(id).await?.messages)
    }

    pub async fn clear_history(&self, id: &str) -> Result<(), GatewayError> {
        let mut session = self.get(id).await?;
        session.messages.clear();
        self.store.save(&session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;
    use serde_json::json;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemorySessionStore::new()), 3600)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let mgr = manager();
        let session = mgr.create(None).await.unwrap();
        let fetched = mgr.get(&session.id).await.unwrap();
        assert_eq!(fetched.id, session.id);
    }

    #[tokio::test]
    async fn get_unknown_session_errors() {
        let mgr = manager();
        assert!(matches!(mgr.get("nope").await, Err(GatewayError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn add_message_appends_in_order() {
        let mgr = manager();
        let session = mgr.create(None).await.unwrap();
        mgr.add_message(&session.id, Message::user("hi")).await.unwrap();
        mgr.add_message(&session.id, Message::assistant("hello")).await.unwrap();

        let history = mgr.get_history(&session.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].content, "hello");
    }

    #[tokio::test]
    async fn update_context_merges_new_keys_over_old() {
        let mgr = manager();
        let mut ctx = Context::new();
        ctx.insert("a".to_string(), json!(1));
        let session = mgr.create(Some(ctx)).await.unwrap();

        let mut partial = Context::new();
        partial.insert("a".to_string(), json!(2));
        partial.insert("b".to_string(), json!(3));
        mgr.update_context(&session.id, partial).await.unwrap();

        let fetched = mgr.get(&session.id).await.unwrap();
        assert_eq!(fetched.context.get("a").unwrap(), &json!(2));
        assert_eq!(fetched.context.get("b").unwrap(), &json!(3));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let mgr = manager();
        let session = mgr.create(None).await.unwrap();
        mgr.delete(&session.id).await.unwrap();
        mgr.delete(&session.id).await.unwrap();
    }
}
