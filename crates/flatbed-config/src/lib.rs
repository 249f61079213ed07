//! Facet types for the flatbed configuration file.
//!
//! The file lives at `.config/flatbed.styx`:
//!
//! ```text
//! schema schema/flatbed.styx
//! database-url "postgres://app@localhost/app"
//! connect-timeout-secs 10
//! skip-constraints (legacy_import)
//! ```

use facet::Facet;
use std::time::Duration;

/// Connection timeout applied when the file does not set one.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct Config {
    /// Path to the schema document, relative to the project root.
    pub schema: Option<String>,

    /// Connection string handed to the database driver as-is.
    pub database_url: Option<String>,

    /// Seconds to wait for the connection to come up.
    pub connect_timeout_secs: Option<u64>,

    /// Tables whose foreign keys are never attempted.
    pub skip_constraints: Option<Vec<String>>,
}

impl Config {
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn skip_constraints(&self) -> &[String] {
        self.skip_constraints.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::default();
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert!(config.skip_constraints().is_empty());
    }

    #[test]
    fn parses_all_keys() {
        let source = r#"{
            schema schema/flatbed.styx
            database-url "postgres://app@localhost/app"
            connect-timeout-secs 3
            skip-constraints (legacy_import audit_log)
        }"#;
        let config: Config = match facet_styx::from_str(source) {
            Ok(config) => config,
            Err(e) => panic!("failed to parse config: {e}"),
        };

        assert_eq!(config.schema.as_deref(), Some("schema/flatbed.styx"));
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://app@localhost/app")
        );
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.skip_constraints(), ["legacy_import", "audit_log"]);
    }
}
