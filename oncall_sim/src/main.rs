//! On-Call Simulator CLI
//!
//! Replay scripted night shifts deterministically and report whether every
//! patient ended where the script expects.

use clap::Parser;
use oncall_core::{ScenarioDefinition, SessionConfig};
use oncall_sim::{HarnessError, ScenarioId, ScenarioResult, ScenarioRunner, SessionExport};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// On-call triage simulator CLI
#[derive(Parser, Debug)]
#[command(name = "oncall-sim")]
#[command(about = "Replay deterministic night-shift scenarios", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (copd_deterioration, sepsis_deadline, busy_night, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Run a JSON scenario definition with a ward-round script instead
    #[arg(long)]
    scenario_file: Option<String>,

    /// Minutes charged for an in-person review
    #[arg(long)]
    review_cost: Option<u32>,

    /// Minutes before a senior answers an escalation
    #[arg(long)]
    escalation_delay: Option<u32>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export a frame-by-frame replay to this JSON file
    #[arg(long)]
    export: Option<String>,
}

fn session_config(args: &Args) -> SessionConfig {
    let mut config = SessionConfig::default();
    if let Some(minutes) = args.review_cost {
        config = config.with_review_cost(minutes);
    }
    if let Some(minutes) = args.escalation_delay {
        config = config.with_escalation_response(minutes);
    }
    config
}

fn load_scenario_file(path: &str) -> Result<ScenarioDefinition, HarnessError> {
    let json = std::fs::read_to_string(path)?;
    Ok(ScenarioDefinition::from_json(&json)?)
}

fn print_json(results: &[ScenarioResult]) {
    let failed = results.iter().filter(|r| !r.passed).count();
    let summary = serde_json::json!({
        "total": results.len(),
        "passed": results.len() - failed,
        "failed": failed,
        "results": results.iter().map(|r| {
            serde_json::json!({
                "scenario": r.scenario,
                "seed": r.seed,
                "passed": r.passed,
                "final_time": r.final_time,
                "metrics": r.metrics,
                "failure_reason": r.failure_reason,
            })
        }).collect::<Vec<_>>(),
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(e) => error!("Failed to encode results: {}", e),
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    if !args.json {
        info!("On-Call Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Determine seed
    let seed = if args.seed == 0 {
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .map_or(1, |nanos| nanos.unsigned_abs())
    } else {
        args.seed
    };

    let runner = ScenarioRunner::new(seed).with_config(session_config(&args));

    let results: Vec<ScenarioResult> = if let Some(path) = &args.scenario_file {
        match load_scenario_file(path) {
            Ok(definition) => vec![runner.run_definition(&definition)],
            Err(e) => {
                error!("Cannot load {}: {}", path, e);
                std::process::exit(1);
            }
        }
    } else {
        let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
            ScenarioId::all()
        } else {
            vec![args.scenario.parse().unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: copd_deterioration, sepsis_deadline, busy_night, all");
                std::process::exit(1);
            })]
        };

        // Handle --export mode
        if let Some(export_path) = &args.export {
            if scenarios.len() > 1 {
                eprintln!("Error: --export only supports a single scenario, not 'all'");
                std::process::exit(1);
            }

            let mut export = SessionExport::new(scenarios[0].name(), seed);
            let result = runner.run_with_export(scenarios[0], &mut export);
            match export.write_to_file(export_path) {
                Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path),
                Err(e) => {
                    error!("Failed to write export: {}", e);
                    std::process::exit(1);
                }
            }
            vec![result]
        } else {
            scenarios.into_iter().map(|s| runner.run(s)).collect()
        }
    };

    let failed_count = results.iter().filter(|r| !r.passed).count();

    if args.json {
        print_json(&results);
    } else {
        for result in &results {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", result.scenario, result.seed);
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    result.scenario,
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", results.len());
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, results.len());
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
