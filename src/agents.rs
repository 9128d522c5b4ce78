//! Agent personas exposed as MCP prompts.
//!
//! An agent pairs a system prompt with the tools it is expected to use.
//! MCP clients list agents as prompts and resolve one to configure their
//! conversation. The built-in [`WebContentAssistant`] guides a user from
//! crawling a site to querying what was stored.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::config::Config;
use crate::tools::ToolContext;

/// A named persona resolvable into an [`AgentPrompt`].
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Tool names this agent works with.
    fn tools(&self) -> Vec<String>;

    fn arguments(&self) -> Vec<AgentArgument> {
        vec![]
    }

    /// Builds the prompt. `ctx` may be used to inject live context.
    async fn resolve(&self, args: Value, ctx: &ToolContext) -> Result<AgentPrompt>;
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentPrompt {
    pub system: String,
    pub tools: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<PromptMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

const ASSISTANT_INSTRUCTIONS: &str = "\
You are a specialized web content assistant that can crawl websites, store content, and retrieve information.
Help users through these main operations:

1. WEBSITE CRAWLING:
   - When a user wants to crawl a website, ask for these essential details if not provided:
     * Starting URL (required): The website address to begin crawling from
     * Pattern (optional): Keywords to filter which URLs to include (e.g., 'docs', 'blog', 'product')
     * Crawl depth (optional, default=2): How many links to follow (1-3 recommended)
     * Collection name (optional): Where to store the results (suggest domain name if user doesn't specify)
   - After gathering details, use crawl_website to perform the crawl
   - Explain that crawling happens asynchronously and provide the task ID to check status
   - Suggest using check_crawl_status to monitor progress

2. COLLECTION AND TASK MANAGEMENT:
   - Use list_collections to show what content collections are available
   - Use list_crawl_tasks to show ongoing and completed crawl operations
   - Use check_crawl_status with a task ID to get detailed status of a specific crawl
   - If no collections exist, suggest crawling a website first
   - Help users organize their collections with meaningful names

3. CONTENT RETRIEVAL:
   - When a user asks questions about crawled content, use query_collection to search
   - Ask which collection to search if not specified
   - Transform user questions into effective search queries
   - Present search results in a readable format with source URLs
   - Summarize the key information from retrieved documents

Be conversational but efficient. Guide users through the workflow from crawling to querying.
Proactively suggest next steps based on user needs without being overly verbose.
If users provide incomplete information, ask clarifying questions rather than making assumptions.";

/// Guides a user through crawl → check status → query.
pub struct WebContentAssistant;

impl WebContentAssistant {
    pub const NAME: &'static str = "web-content-assistant";
}

#[async_trait]
impl Agent for WebContentAssistant {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Specialized web scraping assistant that crawls, stores and retrieves web content"
    }

    fn tools(&self) -> Vec<String> {
        [
            "crawl_website",
            "query_collection",
            "list_collections",
            "check_crawl_status",
            "list_crawl_tasks",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn arguments(&self) -> Vec<AgentArgument> {
        vec![AgentArgument {
            name: "request".to_string(),
            description: "What the user wants to crawl or find".to_string(),
            required: false,
        }]
    }

    async fn resolve(&self, args: Value, ctx: &ToolContext) -> Result<AgentPrompt> {
        let mut system = format!(
            "{}\n\nCurrent date and time: {}",
            ASSISTANT_INSTRUCTIONS,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );

        // Live context is best effort; the API may not be running yet.
        match ctx.client.list_collections().await {
            Ok(list) if !list.collections.is_empty() => {
                let names: Vec<&str> = list.collections.iter().map(|c| c.name.as_str()).collect();
                system.push_str(&format!("\nExisting collections: {}", names.join(", ")));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("skipping collection context: {:#}", e),
        }

        let messages = args
            .get("request")
            .and_then(Value::as_str)
            .filter(|r| !r.trim().is_empty())
            .map(|r| {
                vec![PromptMessage {
                    role: "user".to_string(),
                    content: r.to_string(),
                }]
            })
            .unwrap_or_default();

        Ok(AgentPrompt {
            system,
            tools: self.tools(),
            messages,
        })
    }
}

pub struct AgentRegistry {
    agents: Vec<Box<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self { agents: Vec::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(WebContentAssistant));
        registry
    }

    pub fn register(&mut self, agent: Box<dyn Agent>) {
        self.agents.push(agent);
    }

    pub fn agents(&self) -> &[Box<dyn Agent>] {
        &self.agents
    }

    pub fn find(&self, name: &str) -> Option<&dyn Agent> {
        self.agents
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// `crawlctx agent prompt`: resolve the assistant persona and print it.
pub async fn run_agent_prompt(config: &Config, request: Option<&str>) -> Result<()> {
    let ctx = ToolContext::new(ApiClient::new(&config.agent));
    let args = match request {
        Some(r) => serde_json::json!({ "request": r }),
        None => serde_json::json!({}),
    };
    let prompt = WebContentAssistant.resolve(args, &ctx).await?;

    println!("{}", prompt.system);
    println!();
    println!("Tools: {}", prompt.tools.join(", "));
    for msg in &prompt.messages {
        println!();
        println!("[{}] {}", msg.role, msg.content);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn offline_ctx() -> ToolContext {
        ToolContext::new(ApiClient::new(&AgentConfig {
            api_url: "http://127.0.0.1:9".into(),
            status_timeout_secs: 2,
            ..Default::default()
        }))
    }

    #[test]
    fn assistant_tools_exist_in_tool_registry() {
        let tools = ToolRegistry::with_builtins();
        for name in WebContentAssistant.tools() {
            assert!(tools.find(&name).is_some(), "{}", name);
        }
    }

    #[tokio::test]
    async fn resolve_includes_instructions_and_datetime() {
        let prompt = WebContentAssistant
            .resolve(json!({}), &offline_ctx())
            .await
            .unwrap();
        assert!(prompt.system.contains("WEBSITE CRAWLING"));
        assert!(prompt.system.contains("Current date and time: "));
        assert!(prompt.messages.is_empty());
        assert_eq!(prompt.tools.len(), 5);
    }

    #[tokio::test]
    async fn request_argument_becomes_user_message() {
        let prompt = WebContentAssistant
            .resolve(json!({ "request": "crawl the rust book" }), &offline_ctx())
            .await
            .unwrap();
        assert_eq!(prompt.messages.len(), 1);
        assert_eq!(prompt.messages[0].role, "user");
        assert_eq!(prompt.messages[0].content, "crawl the rust book");
    }

    #[test]
    fn registry_finds_builtin() {
        let registry = AgentRegistry::with_builtins();
        assert_eq!(registry.len(), 1);
        assert!(registry.find(WebContentAssistant::NAME).is_some());
        assert!(registry.find("other").is_none());
    }
}
