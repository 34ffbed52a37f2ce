pub mod dispatch;
pub mod validate;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

pub use dispatch::{dispatch, AggregationResult, ToolDetail};
pub use validate::{validate, RejectReason, Resolution, Resolved, ResolutionSource, Suggestion, ToolRequest};

/// The analytic operations a query can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    TripSummary,
    Cancellations,
    Completions,
    OnTimePickup,
    TripTime,
    CompletionRate,
    Benchmarking,
    Heatmap,
}

/// Tool used when the deterministic parser resolves a query on its own.
pub const DEFAULT_TOOL: ToolKind = ToolKind::TripSummary;

impl ToolKind {
    pub const ALL: [ToolKind; 8] = [
        ToolKind::TripSummary,
        ToolKind::Cancellations,
        ToolKind::Completions,
        ToolKind::OnTimePickup,
        ToolKind::TripTime,
        ToolKind::CompletionRate,
        ToolKind::Benchmarking,
        ToolKind::Heatmap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::TripSummary => "get_weekly_trip_summary",
            ToolKind::Cancellations => "get_trip_cancellations",
            ToolKind::Completions => "get_trip_completions",
            ToolKind::OnTimePickup => "get_on_time_pickup_analysis",
            ToolKind::TripTime => "get_trip_time_analysis",
            ToolKind::CompletionRate => "get_completion_rate_analysis",
            ToolKind::Benchmarking => "get_performance_benchmarking",
            ToolKind::Heatmap => "get_performance_heatmap",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::TripSummary => {
                "General trip overview for any period: total, completed and cancelled trips, \
                 completion and on-time rates, trip times and the composite performance score."
            }
            ToolKind::Cancellations => {
                "Trip cancellations: cancellation rate, cancelled trips per period and per weekday. \
                 Use for cancelled or failed trips."
            }
            ToolKind::Completions => {
                "Trip completions: completed trips per period and per weekday. \
                 Use for completed trips or success analysis."
            }
            ToolKind::OnTimePickup => {
                "On-time pickup performance: punctuality rate per period, late pickups, \
                 schedule adherence."
            }
            ToolKind::TripTime => {
                "Trip duration: average, shortest and longest trip time per period. \
                 Use for how long trips take or efficiency."
            }
            ToolKind::CompletionRate => {
                "Completion rate: success percentage per period and per weekday."
            }
            ToolKind::Benchmarking => {
                "Performance benchmarking: compares each period's completion rate, on-time rate \
                 and trip time against the average. Use for comparisons, benchmarks, vs or against."
            }
            ToolKind::Heatmap => {
                "Performance heatmap: completion, on-time and efficiency intensity across periods. \
                 Use for patterns, heatmaps or dashboards."
            }
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name and description offered to an external resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

pub fn descriptors() -> Vec<ToolDescriptor> {
    ToolKind::ALL.iter().map(ToolKind::descriptor).collect()
}

pub fn known_tool_names() -> HashSet<String> {
    ToolKind::ALL.iter().map(|t| t.name().to_string()).collect()
}

const TRIP_INDICATORS: &[&str] = &[
    "trip", "cancel", "complete", "week", "percentage", "data", "plot", "on-time", "pickup",
    "time", "duration", "average", "rate", "punctual", "analytics", "analysis", "summary",
    "report", "benchmark", "benchmarking", "compare", "comparison", "performance", "vs",
    "against", "daily", "heatmap", "multi-axis", "dashboard", "pattern",
];

/// Whether the text looks like a question about the trip log at all.
pub fn is_trip_query(text: &str) -> bool {
    let lower = text.to_lowercase();
    TRIP_INDICATORS.iter().any(|i| lower.contains(i))
}

/// Help text listing the kinds of questions and date phrasings understood.
pub const GUIDANCE: &str = "\
I can answer questions about the trip log. For example:

Trip analysis:
  - How many trips were completed this week?
  - What's our completion rate for the last 2 months?
  - Show me trip cancellations from month of June
  - What's the average trip time for the past 45 days?
  - How are our on-time pickups for Q1 2024?

Comparisons and patterns:
  - How do our daily numbers compare for last week? (benchmarking)
  - Show me patterns across the past 3 months (heatmap)

Date phrasings:
  - last week, this week, last month, this month, last year, this year
  - last 2 weeks, past 3 months, last 2 years, last 30 days
  - month of June, June 2024, last June
  - Q1 2024, Q3, last quarter
  - 2024-01-01 to 2024-03-31";

/// Message shown when a date range was needed but could not be resolved.
pub const REPHRASE_GUIDANCE: &str = "\
I couldn't work out a date range from that question. Try stating it more directly:
  - Show me last week's data
  - Last 30 days trip analysis
  - Month of June completion rates
  - Q1 2024 on-time pickup analysis
  - 2024-01-01 to 2024-03-31";
