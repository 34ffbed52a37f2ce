use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DEFAULT_TOOL, GUIDANCE, REPHRASE_GUIDANCE};
use crate::query::{parse_expression, DateRange, PeriodType};

/// Structured tool call as an external resolver emits it. Nothing in here is
/// trusted until it has been validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub period_type: Option<String>,
    #[serde(alias = "date_description")]
    pub description: Option<String>,
}

/// What a resolver returned for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    ToolCall(ToolRequest),
    /// Free-form answer with no tool selected.
    Text(String),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireResponse {
    ToolCall { tool_call: WireToolCall },
    TextResponse { content: String },
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: WireArguments,
}

#[derive(Default, Deserialize)]
struct WireArguments {
    start_date: Option<String>,
    end_date: Option<String>,
    period_type: Option<String>,
    date_description: Option<String>,
}

impl Suggestion {
    /// Parse the resolver wire format:
    /// `{"type":"tool_call","tool_call":{"name":..,"arguments":{..}}}` or
    /// `{"type":"text_response","content":..}`. Anything else is `None`.
    pub fn from_wire(json: &str) -> Option<Self> {
        let wire: WireResponse = serde_json::from_str(json).ok()?;
        Some(match wire {
            WireResponse::ToolCall { tool_call } => Suggestion::ToolCall(ToolRequest {
                tool_name: tool_call.name,
                start_date: tool_call.arguments.start_date,
                end_date: tool_call.arguments.end_date,
                period_type: tool_call.arguments.period_type,
                description: tool_call.arguments.date_description,
            }),
            WireResponse::TextResponse { content } => Suggestion::Text(content),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    /// No usable suggestion and no date phrase matched.
    Unparseable,
    UnknownTool(String),
    /// One or both range bounds missing.
    IncompleteRange,
    /// Bounds present but not dates, or start after end.
    InvalidRange(String),
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Unparseable => "unparseable",
            RejectReason::UnknownTool(_) => "unknown_tool",
            RejectReason::IncompleteRange => "incomplete_range",
            RejectReason::InvalidRange(_) => "invalid_range",
        }
    }

    /// Text for the end user.
    pub fn guidance(&self) -> &'static str {
        match self {
            RejectReason::UnknownTool(_) => GUIDANCE,
            _ => REPHRASE_GUIDANCE,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownTool(name) => write!(f, "unknown_tool: {name}"),
            RejectReason::InvalidRange(detail) => write!(f, "invalid_range: {detail}"),
            other => f.write_str(other.code()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// A resolver's tool call, accepted as given.
    Suggestion,
    /// The deterministic parser with the default tool.
    Fallback,
}

/// A validated request, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub request: ToolRequest,
    pub range: DateRange,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Resolved),
    Rejected(RejectReason),
}

/// Decide whether a suggestion can be acted on.
///
/// An absent suggestion, a text answer or a tool call without a tool name
/// falls back to parsing `raw_text` and pairing the range with the default
/// tool. A well-formed tool call is checked against `known_tools` and must
/// carry both dates with `start <= end`; its dates are then used as given.
pub fn validate(
    suggestion: Option<&Suggestion>,
    known_tools: &HashSet<String>,
    raw_text: &str,
    today: NaiveDate,
) -> Resolution {
    let request = match suggestion {
        Some(Suggestion::ToolCall(req)) if !req.tool_name.trim().is_empty() => req,
        _ => return fallback(raw_text, today),
    };

    if !known_tools.contains(&request.tool_name) {
        log::debug!("Rejecting unknown tool {:?}", request.tool_name);
        return Resolution::Rejected(RejectReason::UnknownTool(request.tool_name.clone()));
    }

    let (Some(start), Some(end)) = (
        non_empty(request.start_date.as_deref()),
        non_empty(request.end_date.as_deref()),
    ) else {
        return Resolution::Rejected(RejectReason::IncompleteRange);
    };

    let (start, end) = match (parse_date(start), parse_date(end)) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            return Resolution::Rejected(RejectReason::InvalidRange(format!(
                "{start} to {end} is not a pair of YYYY-MM-DD dates"
            )))
        }
    };

    let period_type = request
        .period_type
        .as_deref()
        .and_then(|p| p.parse().ok())
        .unwrap_or(PeriodType::Weekly);

    match DateRange::new(start, end, period_type) {
        Ok(range) => {
            log::debug!("Accepted {} for {range}", request.tool_name);
            Resolution::Resolved(Resolved {
                request: request.clone(),
                range,
                source: ResolutionSource::Suggestion,
            })
        }
        Err(e) => Resolution::Rejected(RejectReason::InvalidRange(e.to_string())),
    }
}

fn fallback(raw_text: &str, today: NaiveDate) -> Resolution {
    match parse_expression(raw_text, today) {
        Some(range) => {
            log::debug!("Fallback parser resolved {raw_text:?} to {range}");
            Resolution::Resolved(Resolved {
                request: ToolRequest {
                    tool_name: DEFAULT_TOOL.name().to_string(),
                    start_date: Some(range.start.to_string()),
                    end_date: Some(range.end.to_string()),
                    period_type: Some(range.period_type.to_string()),
                    description: Some(raw_text.trim().to_string()),
                },
                range,
                source: ResolutionSource::Fallback,
            })
        }
        None => Resolution::Rejected(RejectReason::Unparseable),
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::known_tool_names;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn call(tool: &str, start: Option<&str>, end: Option<&str>) -> Suggestion {
        Suggestion::ToolCall(ToolRequest {
            tool_name: tool.to_string(),
            start_date: start.map(String::from),
            end_date: end.map(String::from),
            period_type: Some("monthly".to_string()),
            description: None,
        })
    }

    fn rejected(resolution: Resolution) -> RejectReason {
        match resolution {
            Resolution::Rejected(reason) => reason,
            Resolution::Resolved(r) => panic!("expected rejection, got {r:?}"),
        }
    }

    fn resolved(resolution: Resolution) -> Resolved {
        match resolution {
            Resolution::Resolved(r) => r,
            Resolution::Rejected(reason) => panic!("expected resolution, got {reason}"),
        }
    }

    fn today() -> NaiveDate {
        d(2024, 6, 12)
    }

    #[test]
    fn test_missing_end_date_is_incomplete() {
        let s = call("get_trip_cancellations", Some("2024-01-01"), None);
        let reason = rejected(validate(Some(&s), &known_tool_names(), "cancellations", today()));
        assert_eq!(reason, RejectReason::IncompleteRange);
        assert_eq!(reason.code(), "incomplete_range");
    }

    #[test]
    fn test_blank_date_is_incomplete() {
        let s = call("get_trip_cancellations", Some("  "), Some("2024-01-31"));
        let reason = rejected(validate(Some(&s), &known_tool_names(), "", today()));
        assert_eq!(reason, RejectReason::IncompleteRange);
    }

    #[test]
    fn test_unknown_tool() {
        let s = call("get_weather", Some("2024-01-01"), Some("2024-01-31"));
        let reason = rejected(validate(Some(&s), &known_tool_names(), "", today()));
        assert_eq!(reason, RejectReason::UnknownTool("get_weather".to_string()));
        assert_eq!(reason.code(), "unknown_tool");
    }

    #[test]
    fn test_unknown_tool_checked_before_dates() {
        let s = call("get_weather", None, None);
        let reason = rejected(validate(Some(&s), &known_tool_names(), "", today()));
        assert_eq!(reason.code(), "unknown_tool");
    }

    #[test]
    fn test_reversed_and_malformed_ranges() {
        let s = call("get_trip_completions", Some("2024-02-01"), Some("2024-01-01"));
        let reason = rejected(validate(Some(&s), &known_tool_names(), "", today()));
        assert_eq!(reason.code(), "invalid_range");

        let s = call("get_trip_completions", Some("last week"), Some("2024-01-01"));
        let reason = rejected(validate(Some(&s), &known_tool_names(), "", today()));
        assert_eq!(reason.code(), "invalid_range");
    }

    #[test]
    fn test_no_suggestion_falls_back_to_parser() {
        let r = resolved(validate(None, &known_tool_names(), "last week", today()));
        assert_eq!(r.source, ResolutionSource::Fallback);
        assert_eq!(r.request.tool_name, "get_weekly_trip_summary");
        assert_eq!(r.range.start, d(2024, 6, 5));
        assert_eq!(r.range.end, d(2024, 6, 11));
        assert_eq!(r.request.start_date.as_deref(), Some("2024-06-05"));
    }

    #[test]
    fn test_text_answer_falls_back() {
        let s = Suggestion::Text("Sure, happy to help".to_string());
        let r = resolved(validate(Some(&s), &known_tool_names(), "Q1 2024 trips", today()));
        assert_eq!(r.source, ResolutionSource::Fallback);
        assert_eq!(r.range.start, d(2024, 1, 1));
        assert_eq!(r.range.end, d(2024, 3, 31));
    }

    #[test]
    fn test_unparseable_without_suggestion() {
        let reason = rejected(validate(None, &known_tool_names(), "trips lately", today()));
        assert_eq!(reason, RejectReason::Unparseable);
        assert_eq!(reason.guidance(), REPHRASE_GUIDANCE);
    }

    #[test]
    fn test_well_formed_suggestion_is_passed_through() {
        // Dates differ from what the parser would derive for the text; the
        // suggestion wins.
        let s = call("get_trip_time_analysis", Some("2024-05-01"), Some("2024-05-20"));
        let r = resolved(validate(Some(&s), &known_tool_names(), "last week", today()));
        assert_eq!(r.source, ResolutionSource::Suggestion);
        assert_eq!(r.range.start, d(2024, 5, 1));
        assert_eq!(r.range.end, d(2024, 5, 20));
        assert_eq!(r.range.period_type, PeriodType::Monthly);
        assert_eq!(Suggestion::ToolCall(r.request), s);
    }

    #[test]
    fn test_missing_period_type_defaults_to_weekly() {
        let s = Suggestion::ToolCall(ToolRequest {
            tool_name: "get_trip_completions".to_string(),
            start_date: Some("2024-05-01".to_string()),
            end_date: Some("2024-05-07".to_string()),
            ..Default::default()
        });
        let r = resolved(validate(Some(&s), &known_tool_names(), "", today()));
        assert_eq!(r.range.period_type, PeriodType::Weekly);
    }

    #[test]
    fn test_from_wire_tool_call() {
        let json = r#"{"type":"tool_call","tool_call":{"name":"get_trip_cancellations",
            "arguments":{"start_date":"2024-06-01","end_date":"2024-06-30",
            "period_type":"monthly","date_description":"month of June"}}}"#;
        let s = Suggestion::from_wire(json).unwrap();
        let Suggestion::ToolCall(req) = s else {
            panic!("expected tool call");
        };
        assert_eq!(req.tool_name, "get_trip_cancellations");
        assert_eq!(req.start_date.as_deref(), Some("2024-06-01"));
        assert_eq!(req.description.as_deref(), Some("month of June"));
    }

    #[test]
    fn test_from_wire_partial_and_text() {
        let json = r#"{"type":"tool_call","tool_call":{"name":"get_trip_completions",
            "arguments":{"start_date":"2024-06-01","end_date":null}}}"#;
        let Some(Suggestion::ToolCall(req)) = Suggestion::from_wire(json) else {
            panic!("expected tool call");
        };
        assert_eq!(req.end_date, None);

        let text = r#"{"type":"text_response","content":"hi"}"#;
        assert_eq!(Suggestion::from_wire(text), Some(Suggestion::Text("hi".to_string())));
    }

    #[test]
    fn test_from_wire_rejects_unknown_shapes() {
        assert_eq!(Suggestion::from_wire("not json"), None);
        assert_eq!(Suggestion::from_wire(r#"{"type":"image"}"#), None);
        assert_eq!(Suggestion::from_wire(r#"{"tool":"x"}"#), None);
    }
}
