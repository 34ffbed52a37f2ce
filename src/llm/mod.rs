pub mod agents;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::query::parse_expression;
use crate::tools::{Suggestion, ToolDescriptor, ToolRequest, DEFAULT_TOOL};

pub use agents::tool_call::AgentResolver;

/// Something that turns a question into a tool suggestion.
///
/// Implementations may be wrong, slow or unavailable; whatever they return is
/// validated before use. Resolvers are shared across threads, but each call
/// is driven on the caller's task.
#[async_trait(?Send)]
pub trait QueryResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(
        &self,
        text: &str,
        tools: &[ToolDescriptor],
        today: NaiveDate,
    ) -> Result<Option<Suggestion>>;
}

/// Resolver backed only by the deterministic date parser. Always available;
/// always picks the default summary tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserResolver;

#[async_trait(?Send)]
impl QueryResolver for ParserResolver {
    fn name(&self) -> &str {
        "parser"
    }

    async fn resolve(
        &self,
        text: &str,
        _tools: &[ToolDescriptor],
        today: NaiveDate,
    ) -> Result<Option<Suggestion>> {
        Ok(parse_expression(text, today).map(|range| {
            Suggestion::ToolCall(ToolRequest {
                tool_name: DEFAULT_TOOL.name().to_string(),
                start_date: Some(range.start.to_string()),
                end_date: Some(range.end.to_string()),
                period_type: Some(range.period_type.to_string()),
                description: Some(text.trim().to_string()),
            })
        }))
    }
}

/// Ask `resolver` with a deadline. Errors and timeouts are logged and turned
/// into `None` so the caller falls back to the deterministic parser.
pub async fn resolve_with_timeout(
    resolver: &dyn QueryResolver,
    text: &str,
    tools: &[ToolDescriptor],
    today: NaiveDate,
    timeout: Duration,
) -> Option<Suggestion> {
    match tokio::time::timeout(timeout, resolver.resolve(text, tools, today)).await {
        Ok(Ok(suggestion)) => {
            log::debug!("{} resolver returned {suggestion:?}", resolver.name());
            suggestion
        }
        Ok(Err(e)) => {
            log::warn!("{} resolver failed, using fallback parser: {e}", resolver.name());
            None
        }
        Err(_) => {
            log::warn!(
                "{} resolver, using fallback parser: {}",
                resolver.name(),
                Error::ResolverTimeout(timeout.as_secs())
            );
            None
        }
    }
}

/// Build the LLM-backed resolver described by `settings`, or `None` when no
/// provider is configured.
pub async fn create_resolver(settings: &Settings) -> Result<Option<AgentResolver>> {
    let provider = match settings.llm_provider.as_str() {
        "" | "none" => return Ok(None),
        p => p,
    };
    let agent = build_agent(provider, &settings.llm_model).await?;
    Ok(Some(AgentResolver::new(agent)))
}

async fn build_agent(provider: &str, model_name: &str) -> Result<mixtape_core::Agent> {
    // Each combination needs its own builder call since the model types are different.
    match (provider, model_name) {
        ("bedrock", "claude-haiku-4-5" | "haiku") => mixtape_core::Agent::builder()
            .bedrock(mixtape_core::ClaudeHaiku4_5)
            .build()
            .await
            .map_err(|e| Error::Llm(e.to_string())),
        ("bedrock", _) => mixtape_core::Agent::builder()
            .bedrock(mixtape_core::ClaudeSonnet4_5)
            .build()
            .await
            .map_err(|e| Error::Llm(e.to_string())),
        ("anthropic", "claude-haiku-4-5" | "haiku") => mixtape_core::Agent::builder()
            .anthropic_from_env(mixtape_core::ClaudeHaiku4_5)
            .build()
            .await
            .map_err(|e| Error::Llm(e.to_string())),
        ("anthropic", _) => mixtape_core::Agent::builder()
            .anthropic_from_env(mixtape_core::ClaudeSonnet4_5)
            .build()
            .await
            .map_err(|e| Error::Llm(e.to_string())),
        (other, _) => Err(Error::Config(format!("unknown llm_provider: {other}"))),
    }
}
