use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tripq::tools::{self, ToolDetail};
use tripq::{
    AggregationResult, LoadReport, Period, QueryOutcome, Resolution, Settings, Suggestion,
    SummaryMetrics, ToolKind, ToolRequest, TripAnalytics, TripDataset,
};

#[derive(Parser)]
#[command(name = "tripq", about = "Natural-language trip analytics")]
struct Cli {
    /// Database path (default: ~/.tripq/tripq.db)
    #[arg(long)]
    db: Option<String>,

    /// Trip CSV to load (default: the trip_csv config value)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Evaluate relative dates against this day instead of today (YYYY-MM-DD)
    #[arg(long)]
    today: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question about the trip log
    Ask {
        /// The question, e.g. "cancellations last 2 weeks"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Skip the LLM resolver and use the date parser only
        #[arg(long)]
        offline: bool,
    },
    /// Resolve a date expression without touching the data
    Parse {
        #[arg(required = true, num_args = 1..)]
        expression: Vec<String>,
    },
    /// Run one analysis directly
    Report {
        /// Tool name (see `tripq tools`)
        #[arg(long, default_value = "get_weekly_trip_summary")]
        tool: String,
        /// Period key: 2024, 2024-Q1, 2024-06, 2024-W05 or 30d
        #[arg(long, conflicts_with_all = ["from", "to"])]
        period: Option<String>,
        /// Range start (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// Range end (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the available analyses
    Tools,
    /// Show what the loaded dataset contains
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let today = match &cli.today {
        Some(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("invalid --today {s:?}: {e}"))?,
        None => chrono::Local::now().date_naive(),
    };

    match cli.command {
        Commands::Parse { expression } => print_parse(&expression.join(" "), today),
        Commands::Tools => {
            for tool in ToolKind::ALL {
                println!("{}", tool.name());
                println!("    {}", tool.description());
            }
        }
        Commands::Config { action } => {
            let db = open_db(cli.db.as_deref()).await?;
            handle_config(&db, action).await?;
        }
        Commands::Status => {
            let ctx = load_context(cli.db.as_deref(), cli.csv).await?;
            print_status(&ctx);
        }
        Commands::Ask {
            query,
            json,
            offline,
        } => {
            let ctx = load_context(cli.db.as_deref(), cli.csv).await?;
            let mut analytics = TripAnalytics::new(ctx.dataset);
            if !offline {
                if let Some(resolver) = tripq::llm::create_resolver(&ctx.settings).await? {
                    analytics =
                        analytics.with_resolver(Box::new(resolver), ctx.settings.resolver_timeout());
                }
            }
            let outcome = analytics.answer(&query.join(" "), today).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Commands::Report {
            tool,
            period,
            from,
            to,
            json,
        } => {
            let mut request = ToolRequest {
                tool_name: tool,
                start_date: from,
                end_date: to,
                ..Default::default()
            };
            if let Some(key) = period {
                let range = Period::parse(&key, today)?.to_range()?;
                request.start_date = Some(range.start.to_string());
                request.end_date = Some(range.end.to_string());
                request.period_type = Some(range.period_type.to_string());
                request.description = Some(key);
            } else {
                request.period_type = Some("custom".to_string());
            }

            let suggestion = Suggestion::ToolCall(request);
            let resolved =
                match tools::validate(Some(&suggestion), &tools::known_tool_names(), "", today) {
                    Resolution::Resolved(r) => r,
                    Resolution::Rejected(reason) => anyhow::bail!("{reason}"),
                };

            let ctx = load_context(cli.db.as_deref(), cli.csv).await?;
            let result = TripAnalytics::new(ctx.dataset).run(&resolved)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
    }

    Ok(())
}

/// Settings plus the loaded trip log.
struct Context {
    settings: Settings,
    csv: PathBuf,
    dataset: TripDataset,
    report: LoadReport,
}

async fn open_db(path: Option<&str>) -> anyhow::Result<tripq::Database> {
    Ok(match path {
        Some(path) => tripq::Database::open_at(path).await?,
        None => tripq::Database::open().await?,
    })
}

async fn load_context(db_path: Option<&str>, csv: Option<PathBuf>) -> anyhow::Result<Context> {
    let db = open_db(db_path).await?;
    let settings = Settings::load(&db).await?;
    let csv = csv.or_else(|| settings.trip_csv.clone()).ok_or_else(|| {
        anyhow::anyhow!("No trip dataset. Pass --csv PATH or run 'tripq config set trip_csv PATH'.")
    })?;
    let (dataset, report) = tripq::dataset::load_csv(&csv)?;
    if report.parse_errors > 0 {
        eprintln!("Skipped {} unreadable rows in {}", report.parse_errors, csv.display());
    }
    Ok(Context {
        settings,
        csv,
        dataset,
        report,
    })
}

fn print_parse(expression: &str, today: chrono::NaiveDate) {
    match tripq::parse_expression(expression, today) {
        Some(range) => {
            let days = range.num_days();
            println!("{range}");
            println!("  Days:     {days}");
            println!(
                "  Buckets:  {} (if the data covers the whole range)",
                tripq::BucketUnit::for_span_days(days).as_str()
            );
            println!("  Encoding: {}", tripq::Encoding::for_span_days(days).as_str());
        }
        None => {
            println!("No date range recognized in {expression:?}.");
            println!();
            println!("{}", tools::REPHRASE_GUIDANCE);
        }
    }
}

fn print_status(ctx: &Context) {
    let (csv, dataset, report) = (&ctx.csv, &ctx.dataset, &ctx.report);
    let all = tripq::metrics::summarize(dataset.records(), None);
    println!("Dataset Status");
    println!("  Source:     {}", csv.display());
    println!("  Trips:      {}", dataset.len());
    println!("  Completed:  {}", all.completed_trips);
    println!("  Cancelled:  {}", all.cancelled_trips);
    println!("  Other:      {}", all.total_trips - all.completed_trips - all.cancelled_trips);
    match dataset.date_span() {
        Some((first, last)) => println!("  Span:       {first} to {last} ({} days)", all.total_days),
        None => println!("  Span:       no dated trips"),
    }
    if report.missing_dates > 0 {
        println!("  Undated:    {}", report.missing_dates);
    }
    if report.parse_errors > 0 {
        println!("  Skipped:    {}", report.parse_errors);
    }
}

fn print_outcome(outcome: &QueryOutcome) {
    match outcome {
        QueryOutcome::Guidance { message } => println!("{message}"),
        QueryOutcome::Answered(result) => print_result(result),
        QueryOutcome::Rejected { reason, guidance } => {
            eprintln!("Could not answer ({reason}).");
            println!("{guidance}");
        }
    }
}

fn print_result(r: &AggregationResult) {
    println!("{}: {}", r.tool.name(), r.range);
    if let Some(desc) = &r.description {
        println!("  {desc}");
    }
    println!(
        "  Grouped by {}, {} chart",
        r.granularity.bucket_unit.as_str(),
        r.recommended_encoding.as_str()
    );
    println!();
    print_metrics(&r.metrics);

    if !r.bucketed_series.is_empty() {
        println!();
        println!("  {:<14} {:>6} {:>6} {:>6} {:>8} {:>8}", "Period", "Trips", "Done", "Cxl", "Compl%", "OnTime%");
        for b in &r.bucketed_series.buckets {
            let m = &b.metrics;
            println!(
                "  {:<14} {:>6} {:>6} {:>6} {:>8.1} {:>8.1}",
                b.label, m.total_trips, m.completed_trips, m.cancelled_trips, m.completion_rate, m.on_time_rate
            );
        }
    }

    print_detail(&r.detail);
}

fn print_metrics(m: &SummaryMetrics) {
    if m.total_trips == 0 {
        println!("  No trips in this range.");
        return;
    }
    println!("  Trips:        {} ({} completed, {} cancelled)", m.total_trips, m.completed_trips, m.cancelled_trips);
    println!("  Completion:   {:.1}%", m.completion_rate);
    println!("  On time:      {:.1}% ({} pickups)", m.on_time_rate, m.on_time_count);
    println!(
        "  Trip time:    avg {:.1} min, min {:.1}, max {:.1}, std {:.1}",
        m.avg_trip_time, m.min_trip_time, m.max_trip_time, m.trip_time_std
    );
    println!("  Per day:      {:.1} trips over {} days", m.avg_daily_trips, m.total_days);
    println!("  Efficiency:   {:.1}", m.efficiency_score);
    println!("  Performance:  {:.1}/100", m.performance_score);
}

fn print_detail(detail: &ToolDetail) {
    match detail {
        ToolDetail::Summary => {}
        ToolDetail::Cancellations {
            cancellation_rate,
            by_weekday,
        } => {
            println!();
            println!("  Cancellation rate: {cancellation_rate:.1}%");
            for w in by_weekday {
                println!("    {}: {}", w.weekday, w.count);
            }
        }
        ToolDetail::Completions { by_weekday } => {
            println!();
            println!("  Completions by weekday:");
            for w in by_weekday {
                println!("    {}: {}", w.weekday, w.count);
            }
        }
        ToolDetail::OnTimePickup {
            late_count,
            by_bucket,
        } => {
            println!();
            println!("  Late pickups: {late_count}");
            for b in by_bucket {
                println!("    {:<14} {:>6.1}% {}", b.label, b.rate, b.band.as_str());
            }
        }
        ToolDetail::TripTime { by_bucket } => {
            println!();
            for b in by_bucket {
                println!(
                    "    {:<14} avg {:>5.1} min  (min {:.1}, max {:.1}, {} trips)",
                    b.label, b.avg, b.min, b.max, b.completed_trips
                );
            }
        }
        ToolDetail::CompletionRate { by_weekday } => {
            println!();
            for w in by_weekday {
                println!("    {}: {:.1}% of {} ({})", w.weekday, w.rate, w.total, w.band.as_str());
            }
        }
        ToolDetail::Benchmarking {
            averages,
            by_bucket,
        } => {
            println!();
            println!(
                "  Averages: completion {:.1}%, on time {:.1}%, trip time {:.1} min",
                averages.completion_rate, averages.on_time_rate, averages.trip_time
            );
            for row in by_bucket {
                let mark = |better: bool| if better { "+" } else { "-" };
                let time = row
                    .trip_time
                    .map(|t| format!("{:+.1} min {}", t.delta, mark(t.better_than_average)))
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "    {:<14} completion {:+.1} {}  on time {:+.1} {}  time {}",
                    row.label,
                    row.completion_rate.delta,
                    mark(row.completion_rate.better_than_average),
                    row.on_time_rate.delta,
                    mark(row.on_time_rate.better_than_average),
                    time
                );
            }
        }
        ToolDetail::Heatmap { by_bucket } => {
            println!();
            println!("  {:<14} {:>8} {:>8} {:>8}", "Period", "Compl%", "OnTime%", "Effic%");
            for row in by_bucket {
                println!(
                    "  {:<14} {:>8.1} {:>8.1} {:>8.1}",
                    row.label, row.completion_rate, row.on_time_rate, row.trip_efficiency
                );
            }
        }
    }
}

async fn handle_config(db: &tripq::Database, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match tripq::config::get(db, &key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            tripq::config::set(db, &key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = tripq::config::list(db).await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
