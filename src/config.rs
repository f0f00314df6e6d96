//! Emitter configuration
//!
//! All fields are optional in serialized form and use camelCase keys,
//! e.g. `{"maxListeners": 20, "policy": "reject"}`.

use crate::error::{EmitterError, Result};
use serde::{Deserialize, Serialize};

/// Default advisory listener threshold per event
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// What happens when an event reaches its listener threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaxListenersPolicy {
    /// Report a warning to the diagnostic sink, register anyway
    #[default]
    Warn,
    /// Fallible registration refuses listeners beyond the threshold
    Reject,
}

/// Construction-time configuration for an `EventEmitter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitterConfig {
    /// Listener count per event at which a warning is reported
    #[serde(default = "default_max_listeners")]
    pub max_listeners: usize,

    /// Threshold handling
    #[serde(default)]
    pub policy: MaxListenersPolicy,
}

fn default_max_listeners() -> usize {
    DEFAULT_MAX_LISTENERS
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            max_listeners: DEFAULT_MAX_LISTENERS,
            policy: MaxListenersPolicy::Warn,
        }
    }
}

impl EmitterConfig {
    /// Set the listener threshold
    pub fn with_max_listeners(mut self, max_listeners: usize) -> Self {
        self.max_listeners = max_listeners;
        self
    }

    /// Set the threshold policy
    pub fn with_policy(mut self, policy: MaxListenersPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_listeners == 0 {
            return Err(EmitterError::Config(
                "maxListeners must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
