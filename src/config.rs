//! Configuration types for task-loader

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Worker pool configuration ([`FixedThreadPool`])
///
/// Works out of the box via [`Default`]; every field also deserializes with
/// a sensible default so partial config files stay valid.
///
/// [`FixedThreadPool`]: crate::FixedThreadPool
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum degree of parallelism -- number of worker threads (default: 3)
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Worker thread name prefix; threads are named `{prefix}-{index}`
    /// (default: "load-worker")
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl PoolConfig {
    /// Configuration with the given parallelism and default naming.
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    /// Validate the configuration before building a pool from it.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.threads == 0 {
            return Err(SetupError::Config {
                message: "threads must be at least 1".to_string(),
            });
        }
        if self.thread_name_prefix.is_empty() {
            return Err(SetupError::Config {
                message: "thread_name_prefix must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

fn default_threads() -> usize {
    3
}

fn default_thread_name_prefix() -> String {
    "load-worker".to_string()
}
