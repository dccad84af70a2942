//! Profile listing tool.

use crate::config::ProfileTable;
use crate::error::Result;
use crate::protocol::{CallToolResult, Tool};
use crate::tools::registry::ToolHandler;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct ProfileSummary<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    is_default: bool,
}

#[derive(Debug, Serialize)]
struct ProfileListing<'a> {
    default_profile: &'a str,
    profiles: Vec<ProfileSummary<'a>>,
}

pub struct ListProfilesTool {
    profiles: Arc<ProfileTable>,
}

impl ListProfilesTool {
    pub fn new(profiles: Arc<ProfileTable>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ToolHandler for ListProfilesTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "list_profiles".into(),
            description: Some(
                "List the configured connection profiles and mark the default one.".into(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(&self, _arguments: Value) -> Result<CallToolResult> {
        let default = self.profiles.default_profile().name();

        let listing = ProfileListing {
            default_profile: default,
            profiles: self
                .profiles
                .iter()
                .map(|profile| ProfileSummary {
                    name: profile.name(),
                    description: profile.description(),
                    is_default: profile.name() == default,
                })
                .collect(),
        };

        Ok(CallToolResult::json(&listing))
    }
}
