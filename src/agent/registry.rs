//! Agent registry: maps a job's agent key to a constructor.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::Job;

use super::cpu::CpuStatsAgent;
use super::entropy::EntropyAgent;
use super::hostname::HostnameAgent;
use super::memory::MemoryStatsAgent;
use super::munin::MuninPluginRunner;
use super::traits::{Agent, AgentDoc, AgentError, ConfigurableAgent};

/// Constructor taking the job's agent configuration.
pub type AgentFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Box<dyn Agent>, AgentError> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    doc: AgentDoc,
    factory: AgentFactory,
}

/// Registry of agent constructors, populated at composition time.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    entries: HashMap<String, Entry>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in agent registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_agent::<CpuStatsAgent>();
        registry.register_agent::<MemoryStatsAgent>();
        registry.register_agent::<EntropyAgent>();
        registry.register_agent::<MuninPluginRunner>();
        registry.register_agent::<HostnameAgent>();
        registry
    }

    /// Register a configurable agent type under its own key.
    pub fn register_agent<A: ConfigurableAgent>(&mut self) {
        self.register(A::KEY, A::describe(), |config| {
            Ok(Box::new(A::from_config(config)?) as Box<dyn Agent>)
        });
    }

    /// Register a constructor, replacing any previous one under `key`.
    pub fn register<F>(&mut self, key: impl Into<String>, doc: AgentDoc, factory: F)
    where
        F: Fn(&serde_json::Value) -> Result<Box<dyn Agent>, AgentError> + Send + Sync + 'static,
    {
        let key = key.into();
        let entry = Entry {
            doc,
            factory: Arc::new(factory),
        };
        if self.entries.insert(key.clone(), entry).is_some() {
            tracing::warn!(agent = %key, "Agent constructor replaced");
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Documentation of every registered agent, sorted by key.
    pub fn docs(&self) -> Vec<(&str, &AgentDoc)> {
        let mut docs: Vec<(&str, &AgentDoc)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.as_str(), &entry.doc))
            .collect();
        docs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        docs
    }

    /// Build a fresh agent instance for `job`.
    ///
    /// # Errors
    /// `AgentError::Config` if the key is unknown or the configuration is
    /// rejected by the agent.
    pub fn build(&self, job: &Job) -> Result<Box<dyn Agent>, AgentError> {
        let entry = self
            .entries
            .get(&job.agent_id)
            .ok_or_else(|| AgentError::Config(format!("unknown agent: '{}'", job.agent_id)))?;
        (entry.factory)(&job.config)
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
