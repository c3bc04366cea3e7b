//! Downstream HTTP clients (§4.8): thin proxies to the semantic-search, ai-agents,
//! and CMS microservices, each reusing the pooled client keyed by base URL.

pub mod ai_agents;
pub mod cms;
pub mod semantic_search;

pub use ai_agents::{AiAgentsBackend, AiAgentsClient};
pub use cms::{CmsClient, CmsResponse};
pub use semantic_search::SemanticSearchClient;
