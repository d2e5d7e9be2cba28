use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use taskforge::orchestration::{RoleRecommendation, DEFAULT_RECOMMENDATION_LIMIT};
use taskforge::{
    Config, Engine, ExecutionPlan, Result, RunResult, RunStatus, SchedulerEvent, SimulatedWorker,
    TaskAnalysis, WorkerRegistry,
};

/// Taskforge - analyse a task, plan it across specialist roles, and run it
#[derive(Parser, Debug)]
#[command(name = "taskforge")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    TASKFORGE_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.taskforge/taskforge.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Configuration file (default: ~/.taskforge/taskforge.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Classify a task and show its roles, subtasks and estimate
    Analyze {
        /// The task description in natural language
        text: String,
    },

    /// Show the staged execution plan for a task
    Plan {
        /// The task description in natural language
        text: String,
    },

    /// Analyse and execute a task with simulated workers
    Run {
        /// The task description in natural language
        text: String,

        /// Scale applied to estimates by the simulated workers (0 = instant)
        #[arg(long, default_value_t = 0.1)]
        speed: f64,
    },

    /// Suggest roles for a task, best first
    Recommend {
        /// The task description in natural language
        text: String,

        /// Maximum number of roles to list
        #[arg(long, short = 'n', default_value_t = DEFAULT_RECOMMENDATION_LIMIT)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    taskforge::log::init_with_debug(cli.debug);
    info!(command = ?cli.command, "taskforge starting");

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let engine = Engine::from_config(config)?;
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Command::Analyze { text } => {
            let analysis = rt.block_on(engine.analyze_task(&text))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
        }
        Command::Plan { text } => {
            let analysis = rt.block_on(engine.analyze_task(&text))?;
            let plan = engine.get_execution_plan(&analysis);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print_plan(&plan);
            }
        }
        Command::Run { text, speed } => {
            let result = rt.block_on(run_task(engine, &text, speed, !cli.json))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        Command::Recommend { text, limit } => {
            let recommendations = engine.recommend_roles(&text, limit);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&recommendations)?);
            } else {
                print_recommendations(&recommendations);
            }
        }
    }

    Ok(())
}

/// Analyse and execute `text`, printing progress events when `progress` is set.
async fn run_task(engine: Engine, text: &str, speed: f64, progress: bool) -> Result<RunResult> {
    let workers = WorkerRegistry::with_fallback(Arc::new(SimulatedWorker::new(speed)));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = engine.with_workers(workers).with_events(tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !progress {
                continue;
            }
            match event {
                SchedulerEvent::TaskStarted { subtask_id, role } => {
                    println!("  ▶ {} started ({})", subtask_id.short(), role)
                }
                SchedulerEvent::TaskCompleted { subtask_id } => {
                    println!("  ✓ {} completed", subtask_id.short())
                }
                SchedulerEvent::TaskFailed { subtask_id, error } => {
                    println!("  ✗ {} failed: {}", subtask_id.short(), error)
                }
                SchedulerEvent::AllTasksComplete => break,
            }
        }
    });

    let analysis = engine.analyze_task(text).await?;
    if progress {
        println!("Running {} subtasks for: {}", analysis.subtasks.len(), text);
    }
    let result = engine.execute_task(&analysis).await;
    // The engine holds the sender; dropping it lets the printer finish.
    drop(engine);
    let _ = printer.await;
    result
}

fn print_analysis(analysis: &TaskAnalysis) {
    let domains: Vec<&str> = analysis.domains.iter().map(|d| d.as_str()).collect();
    let roles: Vec<&str> = analysis.required_roles.iter().map(|r| r.as_str()).collect();

    println!();
    println!("  Analysis:    {}", analysis.id.short());
    println!("  Task:        {}", truncate_string(&analysis.text, 60));
    println!("  Complexity:  {}", analysis.complexity);
    println!("  Domains:     {}", domains.join(", "));
    println!("  Roles:       {}", roles.join(", "));
    println!("  Estimate:    {:.2}s", analysis.estimated_duration.as_secs_f64());
    println!("  Confidence:  {:.0}%", analysis.confidence * 100.0);
    println!();
    for subtask in &analysis.subtasks {
        println!(
            "  [{}] {:<10} {}",
            subtask.priority,
            subtask.role,
            truncate_string(&subtask.description, 60)
        );
    }
    println!();
}

fn print_plan(plan: &ExecutionPlan) {
    println!();
    println!(
        "  Plan {} ({}, ~{:.2}s, {:.0}% confidence)",
        plan.analysis_id.short(),
        plan.complexity,
        plan.estimated_duration.as_secs_f64(),
        plan.confidence * 100.0
    );
    for (index, stage) in plan.stages.iter().enumerate() {
        let mode = if stage.parallel { "parallel" } else { "sequential" };
        println!();
        println!("  Stage {} (tier {}, {})", index + 1, stage.priority, mode);
        for entry in &stage.subtasks {
            println!(
                "    - {} {:<10} {:.2}s",
                entry.id.short(),
                entry.role,
                entry.estimated_duration.as_secs_f64()
            );
        }
    }
    println!();
}

fn print_result(result: &RunResult) {
    println!();
    println!("  Run:         {}", result.analysis_id.short());
    println!("  Status:      {}", format_status(result.status));
    println!(
        "  Subtasks:    {} succeeded, {} failed",
        result.summary.succeeded, result.summary.failed
    );
    println!(
        "  Elapsed:     {:.2}s (estimated {:.2}s)",
        result.elapsed.as_secs_f64(),
        result.estimated.as_secs_f64()
    );
    println!();
    if !result.combined_output.is_empty() {
        println!("{}", result.combined_output);
        println!();
    }
}

fn print_recommendations(recommendations: &[RoleRecommendation]) {
    if recommendations.is_empty() {
        println!("No matching roles.");
        return;
    }
    for rec in recommendations {
        println!(
            "  {:<10} score {:>2}  {:.0}%  {}",
            rec.role,
            rec.score,
            rec.confidence * 100.0,
            rec.reasons.join("; ")
        );
    }
}

fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Completed => format!("\x1b[32m{}\x1b[0m", status), // Green
        RunStatus::PartiallyFailed => format!("\x1b[31m{}\x1b[0m", status), // Red
        RunStatus::Cancelled => format!("\x1b[90m{}\x1b[0m", status), // Gray
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
