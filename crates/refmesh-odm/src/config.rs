use serde::{Deserialize, Serialize};

use crate::error::{OdmError, OdmResult};

/// Session-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdmConfig {
    /// Maximum number of result elements being populated at once. Each
    /// element issues at most one fetch at a time, so this also caps
    /// in-flight reference fetches.
    pub populate_concurrency: usize,
    /// Check query conditions against the schema before any I/O.
    pub verify_conditions: bool,
    /// Capacity of the channel between a streamed find and its consumer.
    pub stream_buffer: usize,
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            populate_concurrency: 20,
            verify_conditions: true,
            stream_buffer: 64,
        }
    }
}

impl OdmConfig {
    /// Parse from TOML; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> OdmResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| OdmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OdmResult<()> {
        if self.populate_concurrency == 0 {
            return Err(OdmError::Config(
                "populate_concurrency must be at least 1".into(),
            ));
        }
        if self.stream_buffer == 0 {
            return Err(OdmError::Config("stream_buffer must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.populate_concurrency = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = OdmConfig::default();
        assert_eq!(c.populate_concurrency, 20);
        assert!(c.verify_conditions);
        c.validate().unwrap();
    }

    #[test]
    fn parses_partial_toml() {
        let c = OdmConfig::from_toml_str("populate_concurrency = 4").unwrap();
        assert_eq!(c.populate_concurrency, 4);
        assert!(c.verify_conditions);
        assert_eq!(c.stream_buffer, 64);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = OdmConfig::from_toml_str("populate_concurrency = 0").unwrap_err();
        assert!(matches!(err, OdmError::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(OdmConfig::from_toml_str("populate_concurrency = \"many\"").is_err());
    }
}
