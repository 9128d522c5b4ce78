//! MCP stdio bridge for the agent tools.
//!
//! Serves the [`ToolRegistry`] as MCP tools and the [`AgentRegistry`] as MCP
//! prompts over stdin/stdout. Every tool call is forwarded to the crawl API
//! through the shared [`ToolContext`]; API failures come back as error tool
//! results carrying the `Failed to ...` text rather than JSON-RPC errors.
//!
//! Logs go to stderr so they never interleave with protocol frames.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::agents::AgentRegistry;
use crate::client::ApiClient;
use crate::config::Config;
use crate::tools::{call_tool, ToolContext, ToolRegistry};

#[derive(Clone)]
pub struct McpBridge {
    tools: Arc<ToolRegistry>,
    agents: Arc<AgentRegistry>,
    ctx: Arc<ToolContext>,
}

impl McpBridge {
    pub fn new(tools: Arc<ToolRegistry>, agents: Arc<AgentRegistry>, ctx: Arc<ToolContext>) -> Self {
        Self { tools, agents, ctx }
    }

    /// Bridge with the built-in tools and assistant, talking to
    /// `config.agent.api_url`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(ToolRegistry::with_builtins()),
            Arc::new(AgentRegistry::with_builtins()),
            Arc::new(ToolContext::new(ApiClient::new(&config.agent))),
        )
    }

    fn to_mcp_tool(tool: &dyn crate::tools::Tool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> =
            match tool.parameters_schema() {
                serde_json::Value::Object(map) => Arc::new(map),
                _ => Arc::new(serde_json::Map::new()),
            };
        let read_only = tool.name() != "crawl_website";

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(read_only)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    fn to_mcp_prompt(agent: &dyn crate::agents::Agent) -> Prompt {
        let args = agent.arguments();
        let arguments = (!args.is_empty()).then(|| {
            args.into_iter()
                .map(|a| PromptArgument {
                    name: a.name,
                    title: None,
                    description: Some(a.description),
                    required: Some(a.required),
                })
                .collect()
        });

        Prompt {
            name: agent.name().to_string(),
            title: None,
            description: Some(agent.description().to_string()),
            arguments,
            icons: None,
            meta: None,
        }
    }
}

fn arguments_value(arguments: Option<serde_json::Map<String, serde_json::Value>>) -> serde_json::Value {
    serde_json::Value::Object(arguments.unwrap_or_default())
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "crawl-harness".to_string(),
                title: Some("Crawl Harness".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Crawl websites into named collections and query them semantically. \
                 Start with crawl_website, follow progress with check_crawl_status, \
                 then search with query_collection. The web-content-assistant prompt \
                 describes the full workflow."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool = self.tools.find(&request.name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            )
        })?;

        let reply = call_tool(tool, arguments_value(request.arguments), &self.ctx).await;
        if reply.is_error {
            Ok(CallToolResult::error(vec![Content::text(reply.text)]))
        } else {
            Ok(CallToolResult::success(vec![Content::text(reply.text)]))
        }
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListPromptsResult, McpError>> + Send + '_ {
        let prompts: Vec<Prompt> = self
            .agents
            .agents()
            .iter()
            .map(|a| Self::to_mcp_prompt(a.as_ref()))
            .collect();
        std::future::ready(Ok(ListPromptsResult::with_all_items(prompts)))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let agent = self.agents.find(&request.name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no agent registered with name: {}", request.name),
                None,
            )
        })?;

        let resolved = agent
            .resolve(arguments_value(request.arguments), &self.ctx)
            .await
            .map_err(|e| {
                McpError::new(
                    ErrorCode::INTERNAL_ERROR,
                    format!("agent '{}': {}", request.name, e),
                    None,
                )
            })?;

        // MCP prompts have no system role; the instructions lead as user context.
        let mut messages = vec![PromptMessage::new_text(
            PromptMessageRole::User,
            &resolved.system,
        )];
        for msg in &resolved.messages {
            let role = match msg.role.as_str() {
                "assistant" => PromptMessageRole::Assistant,
                _ => PromptMessageRole::User,
            };
            messages.push(PromptMessage::new_text(role, &msg.content));
        }

        Ok(GetPromptResult {
            description: Some(agent.description().to_string()),
            messages,
        })
    }
}

/// `crawlctx agent serve`: speak MCP on stdin/stdout until the client
/// disconnects.
pub async fn run_stdio(config: &Config) -> anyhow::Result<()> {
    use rmcp::transport::stdio;
    use rmcp::ServiceExt;

    let bridge = McpBridge::from_config(config);
    tracing::info!(
        "MCP agent bridge on stdio, forwarding to {}",
        config.agent.api_url
    );
    let service = bridge.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_descriptors_carry_schemas() {
        let registry = ToolRegistry::with_builtins();
        let tool = registry.find("query_collection").unwrap();
        let mcp = McpBridge::to_mcp_tool(tool);
        assert_eq!(mcp.name, "query_collection");
        assert_eq!(mcp.input_schema.get("type").unwrap(), "object");
    }

    #[test]
    fn assistant_is_a_prompt_with_optional_argument() {
        let agent = crate::agents::WebContentAssistant;
        let prompt = McpBridge::to_mcp_prompt(&agent);
        assert_eq!(prompt.name, "web-content-assistant");
        let args = prompt.arguments.unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].required, Some(false));
    }
}
