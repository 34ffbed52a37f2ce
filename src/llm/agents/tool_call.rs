use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use crate::date_util::strip_code_fences;
use crate::error::{Error, Result};
use crate::llm::QueryResolver;
use crate::tools::{Suggestion, ToolDescriptor};

/// Resolver that asks an LLM agent to pick a tool and work out the dates.
pub struct AgentResolver {
    agent: mixtape_core::Agent,
}

impl AgentResolver {
    pub fn new(agent: mixtape_core::Agent) -> Self {
        Self { agent }
    }
}

#[async_trait(?Send)]
impl QueryResolver for AgentResolver {
    fn name(&self) -> &str {
        "agent"
    }

    async fn resolve(
        &self,
        text: &str,
        tools: &[ToolDescriptor],
        today: NaiveDate,
    ) -> Result<Option<Suggestion>> {
        let prompt = build_prompt(text, tools, today);

        let response = self
            .agent
            .run(&prompt)
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let text = response.text().trim();
        let json_str = strip_code_fences(text);
        Suggestion::from_wire(json_str)
            .map(Some)
            .ok_or_else(|| Error::Llm(format!("Unrecognized LLM response: {text}")))
    }
}

fn build_prompt(query: &str, tools: &[ToolDescriptor], today: NaiveDate) -> String {
    let tools_json = serde_json::to_string_pretty(tools).unwrap_or_default();
    let today_str = today.format("%Y-%m-%d");
    let day = today.format("%A");
    let month = today.format("%B");
    let year = today.year();
    let week = today.iso_week().week();

    format!(
        r#"You are a trip analytics assistant. The user asked: "{query}"

Current date context:
- Today: {today_str}
- Day: {day}
- Month: {month}
- Year: {year}
- ISO week: {week}

Available tools:
{tools_json}

Pick the single most appropriate tool and resolve the date range the user means.

Respond with ONLY a JSON object (no markdown, no code fences) in this exact format:
{{
  "type": "tool_call",
  "tool_call": {{
    "name": "tool_name_here",
    "arguments": {{
      "start_date": "YYYY-MM-DD",
      "end_date": "YYYY-MM-DD",
      "period_type": "daily|weekly|monthly|yearly|custom",
      "date_description": "human readable description of the range"
    }}
  }}
}}

Date rules (ranges are inclusive, "yesterday" is the day before today):
- "last week" = the 7 days ending yesterday; "this week" = Monday to today
- "last N weeks" = 7*N days before yesterday through yesterday
- "last N months" = 30*N days before yesterday through yesterday
- "last N days" = N days ending yesterday
- "last month" = the previous calendar month; "this month" = the 1st to today
- "month of June" = June 1-30 of the current year; "June 2024" = June 2024
- "Q1 2024" = 2024-01-01 to 2024-03-31; "last quarter" = the previous calendar quarter
- "this year" = January 1 to today; "last year" = the whole previous year
- "2024-01-01 to 2024-03-31" = exactly that range, period_type "custom"

Tool rules:
- cancellations, cancelled or failed trips: get_trip_cancellations
- completions, completed or successful trips: get_trip_completions
- on-time pickup, punctuality, being on schedule: get_on_time_pickup_analysis
- trip time, duration, how long trips take: get_trip_time_analysis
- completion rate, success percentage: get_completion_rate_analysis
- comparisons, benchmarking, vs, against: get_performance_benchmarking
- patterns, heatmap, intensity: get_performance_heatmap
- overviews, summaries, dashboards, anything else about trips: get_weekly_trip_summary

If the question is not about trip data, respond with:
{{"type": "text_response", "content": "<short answer>"}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::descriptors;

    #[test]
    fn test_prompt_carries_date_context_and_tools() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
        let prompt = build_prompt("cancellations last week", &descriptors(), today);

        assert!(prompt.contains(r#"The user asked: "cancellations last week""#));
        assert!(prompt.contains("- Today: 2024-06-12"));
        assert!(prompt.contains("- Day: Wednesday"));
        assert!(prompt.contains("- Month: June"));
        assert!(prompt.contains("- ISO week: 24"));
        for tool in descriptors() {
            assert!(prompt.contains(&tool.name), "missing {}", tool.name);
        }
    }
}
