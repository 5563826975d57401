//! Runtime configuration read from the environment
//!
//! Values are read once, on first access, and then fixed for the life of the
//! process:
//!
//! ```bash
//! EMBER_DISABLE_GPU=1 cargo test --features gpu
//! EMBER_GPU_SYNC_TIMEOUT=10 cargo bench
//! ```

use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 5;
const DEFAULT_WORKGROUP_SIZE: u32 = 256;

/// Settings that shape how the backends run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// When false the device runtime is never initialized
    pub gpu_enabled: bool,
    /// How long a device readback may block before it is reported as failed
    pub sync_timeout: Duration,
    /// Threads per workgroup in generated compute shaders
    pub workgroup_size: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            gpu_enabled: true,
            sync_timeout: Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS),
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Build a config from a variable lookup; missing or unparsable values
    /// fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let gpu_enabled = lookup("EMBER_DISABLE_GPU")
            .is_none_or(|v| matches!(v.trim(), "" | "0" | "false"));
        let sync_timeout = lookup("EMBER_GPU_SYNC_TIMEOUT")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map_or(defaults.sync_timeout, Duration::from_secs);
        let workgroup_size = lookup("EMBER_WORKGROUP_SIZE")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|&n| n > 0 && n <= 256 && n.is_power_of_two())
            .unwrap_or(defaults.workgroup_size);

        Self {
            gpu_enabled,
            sync_timeout,
            workgroup_size,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// The process-wide configuration
pub fn runtime_config() -> &'static RuntimeConfig {
    CONFIG.get_or_init(RuntimeConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = RuntimeConfig::from_lookup(lookup_from(&[]));
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn test_disable_gpu_flag() {
        let cfg = RuntimeConfig::from_lookup(lookup_from(&[("EMBER_DISABLE_GPU", "1")]));
        assert!(!cfg.gpu_enabled);
        let cfg = RuntimeConfig::from_lookup(lookup_from(&[("EMBER_DISABLE_GPU", "0")]));
        assert!(cfg.gpu_enabled);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let cfg = RuntimeConfig::from_lookup(lookup_from(&[
            ("EMBER_GPU_SYNC_TIMEOUT", "soon"),
            ("EMBER_WORKGROUP_SIZE", "100"),
        ]));
        assert_eq!(cfg.sync_timeout, Duration::from_secs(5));
        assert_eq!(cfg.workgroup_size, 256);
    }

    #[test]
    fn test_overrides() {
        let cfg = RuntimeConfig::from_lookup(lookup_from(&[
            ("EMBER_GPU_SYNC_TIMEOUT", "12"),
            ("EMBER_WORKGROUP_SIZE", "64"),
        ]));
        assert_eq!(cfg.sync_timeout, Duration::from_secs(12));
        assert_eq!(cfg.workgroup_size, 64);
    }
}
