use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use super::{Tool, ToolError};

/// Metadata describing a registered tool, for planner prompts and UIs.
#[derive(Clone, Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// Name-to-capability mapping with invoke-time resolution.
///
/// Registration is expected to happen once at process start; re-registering
/// an existing name overwrites deterministically (last wins). Mini-apps own
/// disjoint name spaces by convention, so an overwrite usually means a
/// deliberate replacement; a warning is logged either way.
#[derive(Default)]
pub struct ToolRegistry {
    tools: FxHashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a tool under its declared name, replacing any previous binding.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> &mut Self {
        self.register_arc(Arc::new(tool))
    }

    /// Like [`register`](Self::register) for tools already behind an `Arc`.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool re-registered, previous binding replaced");
        }
        self
    }

    /// Builder-style registration for process-start wiring.
    #[must_use]
    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    /// Resolve and execute a tool by name.
    ///
    /// Fails with [`ToolError::NotFound`] for unknown names and wraps any
    /// capability failure in [`ToolError::Execution`] together with the tool
    /// name, leaving retry/substitute/abort decisions to the caller.
    #[instrument(skip(self, args), err)]
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;
        tool.execute(args)
            .await
            .map_err(|source| ToolError::Execution {
                name: name.to_string(),
                source,
            })
    }

    /// Names of all registered tools.
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Metadata for all registered tools.
    #[must_use]
    pub fn describe(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
                output_schema: t.output_schema(),
            })
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::BoxError;
    use async_trait::async_trait;
    use serde_json::json;

    struct ConstTool {
        name: &'static str,
        value: Value,
    }

    #[async_trait]
    impl Tool for ConstTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "returns a constant"
        }

        async fn execute(&self, _args: Value) -> Result<Value, BoxError> {
            Ok(self.value.clone())
        }
    }

    #[tokio::test]
    async fn unknown_name_fails_at_invoke_time() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("scrape", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound { name } if name == "scrape"));
    }

    #[tokio::test]
    async fn re_registration_is_last_wins() {
        let registry = ToolRegistry::new()
            .with_tool(ConstTool {
                name: "gen",
                value: json!(1),
            })
            .with_tool(ConstTool {
                name: "gen",
                value: json!(2),
            });
        assert_eq!(registry.list().len(), 1);
        let out = registry.invoke("gen", json!({})).await.unwrap();
        assert_eq!(out, json!(2));
    }

    #[tokio::test]
    async fn describe_exposes_schemas() {
        let registry = ToolRegistry::new().with_tool(ConstTool {
            name: "gen",
            value: json!(null),
        });
        let info = registry.describe();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].name, "gen");
        assert_eq!(info[0].input_schema["type"], "object");
    }
}
