//! Named execution profiles.
//!
//! A [`ProfileTable`] is built once at startup from [`ProfilesConfig`] and the
//! [`LegacyOverlay`], then shared read-only behind an `Arc`. Names resolve
//! case-insensitively; limits are clamped to the hard ceilings before the table is frozen.

use super::{LegacyOverlay, ProfileConfig, ProfilesConfig};
use crate::database::{ConnectionDescriptor, ConnectionStringParser};
use crate::error::{ConfigError, ConfigResult, DbResult, QueryError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

/// Absolute row ceiling. No profile or request can exceed it.
pub const HARD_ROW_LIMIT: u32 = 10_000;

/// Absolute command timeout ceiling, in seconds.
pub const HARD_COMMAND_TIMEOUT_SECONDS: u32 = 300;

/// Name of the default profile when configuration does not choose one.
pub const DEFAULT_PROFILE_NAME: &str = "default";

const FALLBACK_DEFAULT_MAX_ROWS: i64 = 100;
const FALLBACK_MAX_ROWS: i64 = 5_000;
const FALLBACK_COMMAND_TIMEOUT_SECONDS: i64 = 30;

/// Row and time limits of one profile.
///
/// Always satisfies `1 <= default_max_rows <= max_rows <= HARD_ROW_LIMIT` and
/// `1 <= command_timeout_seconds <= HARD_COMMAND_TIMEOUT_SECONDS`. The only constructor
/// clamps, so an out-of-range instance cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionLimits {
    default_max_rows: u32,
    max_rows: u32,
    command_timeout_seconds: u32,
}

impl ExecutionLimits {
    pub fn clamped(default_max_rows: i64, max_rows: i64, command_timeout_seconds: i64) -> Self {
        let max_rows = max_rows.clamp(1, i64::from(HARD_ROW_LIMIT)) as u32;
        let default_max_rows = default_max_rows.clamp(1, i64::from(max_rows)) as u32;
        let command_timeout_seconds =
            command_timeout_seconds.clamp(1, i64::from(HARD_COMMAND_TIMEOUT_SECONDS)) as u32;

        Self {
            default_max_rows,
            max_rows,
            command_timeout_seconds,
        }
    }

    fn from_config(config: &ProfileConfig) -> Self {
        Self::clamped(
            config.default_max_rows.unwrap_or(FALLBACK_DEFAULT_MAX_ROWS),
            config.max_rows.unwrap_or(FALLBACK_MAX_ROWS),
            config
                .command_timeout_seconds
                .unwrap_or(FALLBACK_COMMAND_TIMEOUT_SECONDS),
        )
    }

    pub fn default_max_rows(&self) -> u32 {
        self.default_max_rows
    }

    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    pub fn command_timeout_seconds(&self) -> u32 {
        self.command_timeout_seconds
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.command_timeout_seconds))
    }

    /// Effective row limit for a request: the requested value (or the default), clamped
    /// into `[1, max_rows]`.
    pub fn row_limit(&self, requested: Option<i64>) -> u32 {
        requested
            .unwrap_or(i64::from(self.default_max_rows))
            .clamp(1, i64::from(self.max_rows)) as u32
    }
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::clamped(
            FALLBACK_DEFAULT_MAX_ROWS,
            FALLBACK_MAX_ROWS,
            FALLBACK_COMMAND_TIMEOUT_SECONDS,
        )
    }
}

/// A named bundle of connection target and limits.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    description: Option<String>,
    connection: ConnectionDescriptor,
    limits: ExecutionLimits,
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        connection: ConnectionDescriptor,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            connection,
            limits,
        }
    }

    /// Name as configured (original case).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn connection(&self) -> &ConnectionDescriptor {
        &self.connection
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }
}

/// Immutable set of profiles keyed by lowercased name.
#[derive(Debug, Clone)]
pub struct ProfileTable {
    default_key: String,
    profiles: BTreeMap<String, Profile>,
}

impl ProfileTable {
    /// Bind structured profiles, overlay legacy settings onto the default profile, clamp,
    /// and freeze.
    pub fn build(config: &ProfilesConfig, overlay: &LegacyOverlay) -> ConfigResult<Self> {
        let default_name = overlay
            .default_profile
            .as_deref()
            .or(config.default_profile.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PROFILE_NAME)
            .to_string();
        let default_key = default_name.to_lowercase();

        let mut raw: BTreeMap<String, (String, ProfileConfig)> = BTreeMap::new();
        for (name, profile) in &config.profiles {
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "profiles".into(),
                    message: "profile names cannot be blank".into(),
                });
            }

            let key = name.to_lowercase();
            if raw.contains_key(&key) {
                return Err(ConfigError::DuplicateProfile(name.to_string()));
            }
            raw.insert(key, (name.to_string(), profile.clone()));
        }

        if !overlay.is_empty() {
            let (_, target) = raw
                .entry(default_key.clone())
                .or_insert_with(|| (default_name.clone(), ProfileConfig::default()));
            overlay.apply_to(target);
        }

        if !raw.contains_key(&default_key) {
            return Err(ConfigError::MissingDefaultProfile(default_name));
        }

        let mut profiles = BTreeMap::new();
        for (key, (name, config)) in raw {
            let profile = Self::bind_profile(name, &config)?;
            profiles.insert(key, profile);
        }

        let table = Self {
            default_key,
            profiles,
        };

        info!(
            "Loaded {} profile(s), default '{}'",
            table.len(),
            table.default_profile().name()
        );

        Ok(table)
    }

    fn bind_profile(name: String, config: &ProfileConfig) -> ConfigResult<Profile> {
        let connection_string = config
            .connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::InvalidConnectionString {
                profile: name.clone(),
                message: "connection_string is required".to_string(),
            })?;

        let connection = ConnectionStringParser::parse(connection_string).map_err(|e| {
            ConfigError::InvalidConnectionString {
                profile: name.clone(),
                message: e.to_string(),
            }
        })?;

        let limits = ExecutionLimits::from_config(config);
        Self::warn_if_clamped(&name, config, &limits);

        Ok(Profile::new(
            name,
            config.description.clone().filter(|d| !d.trim().is_empty()),
            connection,
            limits,
        ))
    }

    fn warn_if_clamped(name: &str, config: &ProfileConfig, limits: &ExecutionLimits) {
        let checks = [
            ("default_max_rows", config.default_max_rows, limits.default_max_rows()),
            ("max_rows", config.max_rows, limits.max_rows()),
            (
                "command_timeout_seconds",
                config.command_timeout_seconds,
                limits.command_timeout_seconds(),
            ),
        ];

        for (field, configured, effective) in checks {
            if let Some(configured) = configured
                && configured != i64::from(effective)
            {
                warn!(
                    profile = %name,
                    field,
                    configured,
                    effective,
                    "Profile limit clamped"
                );
            }
        }
    }

    /// Look up a profile; `None` or a blank name selects the default.
    pub fn resolve(&self, name: Option<&str>) -> DbResult<&Profile> {
        let requested = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => return Ok(self.default_profile()),
        };

        self.profiles
            .get(&requested.to_lowercase())
            .ok_or_else(|| QueryError::ProfileNotFound {
                requested: requested.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    pub fn default_profile(&self) -> &Profile {
        // Presence of the default key is checked in `build`, the only constructor.
        &self.profiles[&self.default_key]
    }

    /// Configured names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.values().map(Profile::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
