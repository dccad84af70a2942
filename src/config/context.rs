//! Execution context reporting.
//!
//! Tells a caller, before it queries, which limits will apply and which of them it may
//! change per call.

use super::profile::{HARD_ROW_LIMIT, Profile, ProfileTable};
use crate::error::DbResult;
use serde::Serialize;
use std::sync::Arc;

/// A single reported option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionDescriptor<T> {
    pub value: T,
    pub description: String,
    pub is_overridable: bool,
}

impl<T> OptionDescriptor<T> {
    fn new(value: T, description: impl Into<String>, is_overridable: bool) -> Self {
        Self {
            value,
            description: description.into(),
            is_overridable,
        }
    }
}

/// Effective limits of one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionContext {
    pub profile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub default_max_rows: OptionDescriptor<u32>,
    pub hard_row_limit: OptionDescriptor<u32>,
    pub command_timeout_seconds: OptionDescriptor<u32>,
}

impl ExecutionContext {
    pub fn for_profile(profile: &Profile) -> Self {
        let limits = profile.limits();

        Self {
            profile: profile.name().to_string(),
            description: profile.description().map(str::to_string),
            default_max_rows: OptionDescriptor::new(
                limits.default_max_rows(),
                "Rows returned when a query does not pass max_rows",
                true,
            ),
            hard_row_limit: OptionDescriptor::new(
                limits.max_rows(),
                format!(
                    "This profile's row ceiling, already clamped to the compile-time limit \
                    of {HARD_ROW_LIMIT}; larger max_rows requests are clamped to it"
                ),
                false,
            ),
            command_timeout_seconds: OptionDescriptor::new(
                limits.command_timeout_seconds(),
                "Seconds a query may run before it is cancelled",
                false,
            ),
        }
    }
}

/// Reports execution contexts from the shared profile table.
#[derive(Debug, Clone)]
pub struct ExecutionContextProvider {
    profiles: Arc<ProfileTable>,
}

impl ExecutionContextProvider {
    pub fn new(profiles: Arc<ProfileTable>) -> Self {
        Self { profiles }
    }

    pub fn context(&self, profile: Option<&str>) -> DbResult<ExecutionContext> {
        self.profiles.resolve(profile).map(ExecutionContext::for_profile)
    }
}
