//! Configuration types and loaders.
//!
//! Two sources feed the profile table at startup:
//! - a TOML document of named profiles, located by `MSSQL_MCP_CONFIG`;
//! - a legacy set of flat `MSSQL_*` environment variables that only ever touch the
//!   default profile.
//!
//! Both are raw and unclamped here. [`ProfileTable::build`] turns them into the frozen table.

pub mod context;
pub mod profile;

pub use context::{ExecutionContext, ExecutionContextProvider, OptionDescriptor};
pub use profile::{
    DEFAULT_PROFILE_NAME, ExecutionLimits, HARD_COMMAND_TIMEOUT_SECONDS, HARD_ROW_LIMIT, Profile,
    ProfileTable,
};

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming the TOML profile file.
pub const CONFIG_PATH_ENV: &str = "MSSQL_MCP_CONFIG";

/// Names of the legacy flat variables.
pub mod legacy_env {
    pub const DEFAULT_PROFILE: &str = "MSSQL_DEFAULT_PROFILE";
    pub const CONNECTION_STRING: &str = "MSSQL_CONNECTION_STRING";
    pub const DESCRIPTION: &str = "MSSQL_DESCRIPTION";
    pub const DEFAULT_MAX_ROWS: &str = "MSSQL_DEFAULT_MAX_ROWS";
    pub const MAX_ROWS: &str = "MSSQL_MAX_ROWS";
    pub const COMMAND_TIMEOUT_SECONDS: &str = "MSSQL_COMMAND_TIMEOUT_SECONDS";
}

/// One profile as written in configuration, before clamping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_max_rows: Option<i64>,
    #[serde(default)]
    pub max_rows: Option<i64>,
    #[serde(default)]
    pub command_timeout_seconds: Option<i64>,
}

/// Structured profile configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesConfig {
    #[serde(default)]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl ProfilesConfig {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidValue {
            field: "profiles".into(),
            message: e.to_string().into(),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        debug!("Read profile configuration from {}", path.display());
        Self::from_toml_str(&content)
    }
}

/// Single-profile settings from flat environment variables.
///
/// Kept for deployments that predate named profiles. Applied to the default profile only,
/// after the structured profiles are bound and before limits are clamped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyOverlay {
    pub default_profile: Option<String>,
    pub connection_string: Option<String>,
    pub description: Option<String>,
    pub default_max_rows: Option<i64>,
    pub max_rows: Option<i64>,
    pub command_timeout_seconds: Option<i64>,
}

impl LegacyOverlay {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &'static str| -> ConfigResult<Option<i64>> {
            text(key)
                .map(|raw| {
                    raw.trim().parse::<i64>().map_err(|_| ConfigError::InvalidValue {
                        field: Cow::Borrowed(key),
                        message: format!("expected an integer, got '{}'", raw).into(),
                    })
                })
                .transpose()
        };

        Ok(Self {
            default_profile: text(legacy_env::DEFAULT_PROFILE).map(|v| v.trim().to_string()),
            connection_string: text(legacy_env::CONNECTION_STRING),
            description: text(legacy_env::DESCRIPTION),
            default_max_rows: number(legacy_env::DEFAULT_MAX_ROWS)?,
            max_rows: number(legacy_env::MAX_ROWS)?,
            command_timeout_seconds: number(legacy_env::COMMAND_TIMEOUT_SECONDS)?,
        })
    }

    /// True when no profile field is set. The default-profile name alone does not count.
    pub fn is_empty(&self) -> bool {
        self.connection_string.is_none()
            && self.description.is_none()
            && self.default_max_rows.is_none()
            && self.max_rows.is_none()
            && self.command_timeout_seconds.is_none()
    }

    /// Overwrite every field this overlay sets.
    pub fn apply_to(&self, profile: &mut ProfileConfig) {
        if let Some(v) = &self.connection_string {
            profile.connection_string = Some(v.clone());
        }
        if let Some(v) = &self.description {
            profile.description = Some(v.clone());
        }
        if let Some(v) = self.default_max_rows {
            profile.default_max_rows = Some(v);
        }
        if let Some(v) = self.max_rows {
            profile.max_rows = Some(v);
        }
        if let Some(v) = self.command_timeout_seconds {
            profile.command_timeout_seconds = Some(v);
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: Cow<'static, str>,
    pub version: Cow<'static, str>,
    pub profiles: ProfilesConfig,
    pub overlay: LegacyOverlay,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
            profiles: ProfilesConfig::default(),
            overlay: LegacyOverlay::default(),
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Load from `MSSQL_MCP_CONFIG` (if set) and the legacy environment overlay.
    pub fn from_env() -> ConfigResult<Self> {
        let profiles = match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                info!("Loading profiles from {}", path);
                ProfilesConfig::from_file(path.trim())?
            }
            _ => {
                debug!("{} not set, relying on legacy environment only", CONFIG_PATH_ENV);
                ProfilesConfig::default()
            }
        };

        Ok(Self::builder()
            .profiles(profiles)
            .overlay(LegacyOverlay::from_env()?)
            .build())
    }

    /// Bind, overlay, clamp and freeze the profile table.
    pub fn profile_table(&self) -> ConfigResult<ProfileTable> {
        ProfileTable::build(&self.profiles, &self.overlay)
    }
}

/// Builder for ServerConfig.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn profiles(mut self, profiles: ProfilesConfig) -> Self {
        self.config.profiles = profiles;
        self
    }

    pub fn overlay(mut self, overlay: LegacyOverlay) -> Self {
        self.config.overlay = overlay;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_profiles_from_toml() {
        let config = ProfilesConfig::from_toml_str(
            r#"
            default_profile = "oltp"

            [profiles.oltp]
            connection_string = "Server=db;User Id=reader;Password=x"
            description = "Primary replica"
            max_rows = 2000

            [profiles.warehouse]
            connection_string = "mssql://reader:x@dw/Warehouse"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_profile.as_deref(), Some("oltp"));
        assert_eq!(config.profiles.len(), 2);
        assert_eq!(config.profiles["oltp"].max_rows, Some(2000));
        assert_eq!(config.profiles["warehouse"].default_max_rows, None);
    }

    #[test]
    fn test_profiles_reject_unknown_fields() {
        let result = ProfilesConfig::from_toml_str(
            r#"
            [profiles.default]
            connection_string = "Server=db;User Id=reader"
            allow_writes = true
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_profiles_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[profiles.default]\nconnection_string = \"Server=db;User Id=sa\""
        )
        .unwrap();

        let config = ProfilesConfig::from_file(file.path()).unwrap();
        assert!(config.profiles.contains_key("default"));
    }

    #[test]
    fn test_profiles_from_missing_file() {
        let result = ProfilesConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Unreadable { .. })));
    }

    #[test]
    fn test_overlay_from_lookup() {
        let overlay = LegacyOverlay::from_lookup(lookup(&[
            (legacy_env::CONNECTION_STRING, "Server=db;User Id=sa"),
            (legacy_env::MAX_ROWS, " 250 "),
            (legacy_env::DESCRIPTION, "   "),
        ]))
        .unwrap();

        assert_eq!(
            overlay.connection_string.as_deref(),
            Some("Server=db;User Id=sa")
        );
        assert_eq!(overlay.max_rows, Some(250));
        assert_eq!(overlay.description, None);
        assert!(!overlay.is_empty());
    }

    #[test]
    fn test_overlay_rejects_non_numeric_limits() {
        let result =
            LegacyOverlay::from_lookup(lookup(&[(legacy_env::COMMAND_TIMEOUT_SECONDS, "soon")]));
        match result {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, legacy_env::COMMAND_TIMEOUT_SECONDS)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_overlay_default_name_alone_is_empty() {
        let overlay =
            LegacyOverlay::from_lookup(lookup(&[(legacy_env::DEFAULT_PROFILE, "warehouse")]))
                .unwrap();
        assert!(overlay.is_empty());
        assert_eq!(overlay.default_profile.as_deref(), Some("warehouse"));
    }

    #[test]
    fn test_overlay_apply_overwrites_only_set_fields() {
        let mut profile = ProfileConfig {
            connection_string: Some("Server=a;User Id=sa".into()),
            description: Some("keep".into()),
            default_max_rows: Some(10),
            max_rows: Some(20),
            command_timeout_seconds: Some(30),
        };
        let overlay = LegacyOverlay {
            max_rows: Some(99),
            ..Default::default()
        };

        overlay.apply_to(&mut profile);

        assert_eq!(profile.description.as_deref(), Some("keep"));
        assert_eq!(profile.max_rows, Some(99));
        assert_eq!(profile.default_max_rows, Some(10));
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::builder().name("custom").build();
        assert_eq!(config.name, "custom");
        assert!(config.profiles.profiles.is_empty());
    }
}
