//! Session Store + Manager (§4.6).

pub mod manager;
pub mod store;

pub use manager::SessionManager;
pub use store::{InMemorySessionStore, Session, SessionStore};

#[cfg(feature = "redis-store")]
pub mod redis_store;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisSessionStore;
