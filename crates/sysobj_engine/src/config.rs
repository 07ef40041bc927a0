use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use sysobj_base::{PalHandle, ResultExt, SysobjError, SysobjResult};

/// Default bound for waiting on a child that has not appeared yet.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 4000;

/// Engine-wide settings, typically read from `sysobj.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Milliseconds [`crate::DirectoryHandle::get`] waits for a missing child.
    pub wait_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Parse an [`EngineConfig`] from TOML text.
pub fn parse_config(text: &str) -> SysobjResult<EngineConfig> {
    toml::from_str(text)
        .map_err(|e| Box::new(SysobjError::message(format!("Invalid configuration: {}", e))))
}

/// Read and parse an [`EngineConfig`] through the platform layer.
pub fn load_config(pal: &PalHandle, path: &Path) -> SysobjResult<EngineConfig> {
    let text = pal
        .read_file_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&text).with_context(|| format!("Failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysobj_base::MockPal;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.wait_timeout(), Duration::from_millis(4000));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        assert_eq!(parse_config("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_load_config_through_pal() {
        let mock = MockPal::new();
        mock.add_file("/work/sysobj.toml", b"wait_timeout_ms = 250\n".to_vec());
        let pal = PalHandle::new(mock);

        let config = load_config(&pal, Path::new("/work/sysobj.toml")).unwrap();
        assert_eq!(config.wait_timeout_ms, 250);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let error = parse_config("wait_timeout = 3").unwrap_err();
        assert!(error.to_string().starts_with("Invalid configuration"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let pal = PalHandle::new(MockPal::new());
        let error = load_config(&pal, Path::new("/nope.toml")).unwrap_err();
        assert!(
            error
                .to_string()
                .starts_with("Failed to read config file /nope.toml")
        );
    }
}
