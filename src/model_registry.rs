//! Model registry: loaded once at startup from YAML, immutable thereafter.
//!
//! Mirrors the provider/alias bookkeeping this crate's `ClientWrapper` family already
//! does informally (each concrete client hardcoding its own model enum); this gateway
//! centralizes that bookkeeping into one declarative file so routing has a single
//! source of truth instead of drift between per-provider enums.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub models: Vec<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub context_window: Option<HashMap<String, u32>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelRegistryFile {
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    #[serde(default)]
    pub routing_default: Option<String>,
}

impl Default for ModelRegistryFile {
    fn default() -> Self {
        ModelRegistryFile { providers: HashMap::new(), aliases: HashMap::new(), routing_default: None }
    }
}

/// Derived lookup tables built once from [`ModelRegistryFile`].
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    pub registered_models: HashMap<String, String>,
    pub prefix_map: Vec<(String, String)>,
    pub aliases: HashMap<String, String>,
    pub routing_default: Option<String>,
    pub context_windows: HashMap<String, u32>,
}

impl ModelRegistry {
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(raw) => match serde_yaml::from_str::<ModelRegistryFile>(&raw) {
                Ok(file) => Self::from_file(file),
                Err(e) => {
                    log::warn!("model registry file is not valid YAML ({e}); starting with empty routing tables");
                    Self::empty()
                }
            },
            Err(e) => {
                log::warn!(
                    "model registry file '{}' could not be read ({e}); starting with empty routing tables",
                    path.as_ref().display()
                );
                Self::empty()
            }
        }
    }

    pub fn empty() -> Self {
        ModelRegistry {
            registered_models: HashMap::new(),
            prefix_map: Vec::new(),
            aliases: HashMap::new(),
            routing_default: None,
            context_windows: HashMap::new(),
        }
    }

    /// Design Note (i): overlapping registrations are first-registered-wins, with a
    /// warning logged for the duplicate, rather than silently letting the last
    /// provider in iteration order win.
    pub fn from_file(file: ModelRegistryFile) -> Self {
        let mut providers: Vec<(&String, &ProviderEntry)> = file.providers.iter().collect();
        providers.sort_by(|a, b| a.0.cmp(b.0));

        let mut registered_models = HashMap::new();
        let mut prefix_map = Vec::new();
        let mut context_windows = HashMap::new();

        for (provider_name, entry) in providers {
            for model in &entry.models {
                if let Some(existing) = registered_models.get(model) {
                    log::warn!(
                        "model '{model}' already registered to provider '{existing}'; \
                         ignoring duplicate registration from '{provider_name}'"
                    );
                    continue;
                }
                registered_models.insert(model.clone(), provider_name.clone());
            }
            if let Some(prefix) = &entry.prefix {
                prefix_map.push((prefix.clone(), provider_name.clone()));
            }
            if let Some(windows) = &entry.context_window {
                for (model, limit) in windows {
                    context_windows.insert(model.clone(), *limit);
                }
            }
        }

        ModelRegistry {
            registered_models,
            prefix_map,
            aliases: file.aliases,
            routing_default: file.routing_default,
            context_windows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModelRegistry {
        let yaml = r#"
providers:
  openai:
    models: ["gpt-5.2"]
  anthropic:
    models: ["claude-sonnet-4.5"]
  deepseek:
    models: ["deepseek-chat", "deepseek-reasoner"]
aliases:
  openai: gpt-5.2
  reasoner: deepseek-reasoner
routing_default: null
"#;
        ModelRegistry::from_file(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn registers_all_provider_models() {
        let reg = sample();
        assert_eq!(reg.registered_models.get("gpt-5.2").unwrap(), "openai");
        assert_eq!(reg.registered_models.get("deepseek-reasoner").unwrap(), "deepseek");
    }

    #[test]
    fn first_registration_wins_on_duplicate() {
        let yaml = r#"
providers:
  a:
    models: ["shared-model"]
  b:
    models: ["shared-model"]
"#;
        let reg = ModelRegistry::from_file(serde_yaml::from_str(yaml).unwrap());
        assert_eq!(reg.registered_models.get("shared-model").unwrap(), "a");
    }
}
