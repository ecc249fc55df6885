//! checkpoint - guard desk CLI
//!
//! Operator tool over the checkpoint's flat files: process scans, register
//! visitors, inspect Special Passes, track student and teacher attendance,
//! manage violations and read the access log.

use std::path::PathBuf;

use anyhow::{Context, Result};
use checkpoint_core::{CheckStatus, CheckType};
use checkpoint_storage::{
    AccessLogEntry, CheckTimes, Checkpoint, FaultCounts, PassHolder, ScanOutcome, StoreConfig,
    VisitorRegistration,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// checkpoint - Special Pass and access control desk
#[derive(Parser, Debug)]
#[command(name = "checkpoint")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML store configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the data files (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process a guard card scan
    Scan {
        /// Scanned id
        id: String,
    },

    /// Register a visitor and issue a Special Pass
    Register(RegisterArgs),

    /// Purge Special Passes more than an hour past expiry
    Cleanup,

    /// Show the state of a Special Pass
    Status {
        /// Special Pass id
        pass_id: String,
    },

    /// Record a check-in or check-out without a scan
    Check {
        /// Special Pass id
        pass_id: String,

        /// CHECK_IN or CHECK_OUT
        #[arg(value_parser = parse_check)]
        check: CheckType,
    },

    /// Student/teacher check-in and check-out
    Attendance {
        /// Student or teacher card id
        card_id: String,

        /// CHECK_IN or CHECK_OUT; toggles when omitted
        #[arg(long, value_parser = parse_check)]
        check: Option<CheckType>,

        /// Only show the current state
        #[arg(long, conflicts_with = "check")]
        show: bool,
    },

    /// Uniform violation counters
    #[command(subcommand)]
    Violation(ViolationCommands),

    /// Resolve a typed student number
    Student {
        /// Student number
        number: String,
    },

    /// Show a guard's name
    Guard {
        /// Guard id
        id: String,
    },

    /// Show the newest access log entries
    Log {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        lines: usize,
    },
}

#[derive(clap::Args, Debug)]
struct RegisterArgs {
    /// Special Pass id to issue
    #[arg(long)]
    pass_id: String,

    /// Visitor's full name
    #[arg(long)]
    name: String,

    /// Phone number or other contact
    #[arg(long)]
    contact: String,

    /// Capacity the visitor comes in (e.g. Parent, Supplier)
    #[arg(long)]
    visiting_as: String,

    /// Purpose of the visit
    #[arg(long)]
    purpose: String,

    /// Person or office visited
    #[arg(long)]
    visiting: String,

    /// Kind of ID left at the desk
    #[arg(long)]
    id_type: String,
}

impl From<RegisterArgs> for VisitorRegistration {
    fn from(args: RegisterArgs) -> Self {
        VisitorRegistration {
            name: args.name,
            contact: args.contact,
            visiting_as: args.visiting_as,
            purpose: args.purpose,
            visiting: args.visiting,
            id_type: args.id_type,
            special_pass_id: args.pass_id,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ViolationCommands {
    /// Add one violation
    Add {
        /// Person id
        id: String,
    },

    /// Show the violation count
    Count {
        /// Person id
        id: String,
    },
}

fn parse_check(value: &str) -> Result<CheckType, String> {
    value.to_ascii_uppercase().parse().map_err(|e| format!("{e}"))
}

#[derive(Serialize)]
struct PassStatus {
    pass_id: String,
    check_status: CheckStatus,
    check_times: CheckTimes,
    expired: bool,
    expired_for_check_in: bool,
    in_grace_period: bool,
    holder: Option<PassHolder>,
}

#[derive(Serialize)]
struct AttendanceStatus<'a> {
    card_id: &'a str,
    performed: Option<CheckType>,
    check_status: CheckStatus,
    check_times: CheckTimes,
}

#[derive(Serialize)]
struct Count<'a> {
    id: &'a str,
    count: u32,
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn store_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn describe_scan(outcome: &ScanOutcome) -> String {
    let message = outcome.display_message();
    match outcome.person() {
        Some(person) => format!("{message}: {} ({})", person.name, person.role),
        None => message.to_string(),
    }
}

fn describe_log(entries: &[AccessLogEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}  {:<12} {:<28} {}", e.timestamp, e.id, e.action, e.status))
        .collect::<Vec<_>>()
        .join("\n")
}

fn report_faults(counts: FaultCounts) {
    if counts.total() > 0 {
        eprintln!(
            "warning: storage faults (malformed rows {}, bad timestamps {}, failed operations {}, failed log writes {})",
            counts.malformed_rows,
            counts.invalid_timestamps,
            counts.failed_operations,
            counts.failed_log_writes
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let config = store_config(&cli)?;
    debug!(data_dir = %config.data_dir.display(), "Opening checkpoint store");
    let checkpoint = Checkpoint::open(config)
        .await
        .context("failed to open checkpoint store")?;
    let json = cli.json;

    info!(command = ?cli.command, "Running command");
    match cli.command {
        Commands::Scan { id } => {
            let outcome = checkpoint.scan(&id).await;
            emit(json, &outcome, || describe_scan(&outcome))?;
        }
        Commands::Register(args) => {
            let form = VisitorRegistration::from(args);
            let record = checkpoint
                .register_visitor(&form)
                .await
                .context("registration refused")?;
            let holder = record.holder();
            emit(json, &holder, || {
                format!(
                    "Special Pass {} issued to {} until {}",
                    record.special_pass_id, holder.name, holder.expires_at
                )
            })?;
        }
        Commands::Cleanup => {
            let removed = checkpoint.cleanup_expired_special_passes().await;
            emit(json, &removed, || format!("Removed {removed} expired Special Pass(es)"))?;
        }
        Commands::Status { pass_id } => {
            let status = PassStatus {
                check_status: checkpoint.get_special_pass_check_status(&pass_id).await,
                check_times: checkpoint.get_special_pass_check_times(&pass_id).await,
                expired: checkpoint.is_special_pass_expired(&pass_id).await,
                expired_for_check_in: checkpoint.is_special_pass_expired_for_checkin(&pass_id).await,
                in_grace_period: checkpoint.is_special_pass_in_grace_period(&pass_id).await,
                holder: checkpoint.is_special_pass_in_use(&pass_id).await,
                pass_id,
            };
            emit(json, &status, || {
                let holder = status
                    .holder
                    .as_ref()
                    .map_or("none".to_string(), |h| format!("{} until {}", h.name, h.expires_at));
                format!(
                    "{}: {}\n  held by: {holder}\n  expired: {} (for check-in: {}, grace: {})",
                    status.pass_id,
                    status.check_status,
                    status.expired,
                    status.expired_for_check_in,
                    status.in_grace_period
                )
            })?;
        }
        Commands::Check { pass_id, check } => {
            let updated = checkpoint.record_special_pass_check(&pass_id, check).await;
            if updated {
                checkpoint.log_access(&pass_id, &format!("SPECIAL_PASS_{check}")).await;
            }
            emit(json, &updated, || {
                if updated {
                    format!("Recorded {check} for {pass_id}")
                } else {
                    format!("No active Special Pass {pass_id}")
                }
            })?;
        }
        Commands::Attendance {
            card_id,
            check,
            show,
        } => {
            let performed = match (show, check) {
                (true, _) => None,
                (false, Some(check)) => checkpoint
                    .record_student_teacher_check(&card_id, check)
                    .await
                    .then_some(check),
                (false, None) => checkpoint.toggle_student_teacher_check(&card_id).await,
            };
            let status = AttendanceStatus {
                card_id: &card_id,
                performed,
                check_status: checkpoint.get_student_teacher_check_status(&card_id).await,
                check_times: checkpoint.get_student_teacher_check_times(&card_id).await,
            };
            emit(json, &status, || match (show, performed) {
                (false, None) => format!("{card_id}: not an active student or teacher"),
                (_, Some(check)) => format!("Recorded {check} for {card_id}"),
                (true, None) => format!("{card_id}: {}", status.check_status),
            })?;
        }
        Commands::Violation(ViolationCommands::Add { id }) => {
            let count = checkpoint.add_violation(&id).await;
            emit(json, &Count { id: &id, count }, || format!("{id}: {count} violation(s)"))?;
        }
        Commands::Violation(ViolationCommands::Count { id }) => {
            let count = checkpoint.get_violation_count(&id).await;
            emit(json, &Count { id: &id, count }, || format!("{id}: {count} violation(s)"))?;
        }
        Commands::Student { number } => {
            let valid = checkpoint.is_student_number_valid(&number).await;
            let person = checkpoint.get_person_by_student_number(&number).await;
            emit(json, &person, || match &person {
                Some(p) => format!("{number} -> {} ({})", p.id, p.name),
                None if valid => format!("{number}: valid, but no RFID mapped"),
                None => format!("{number}: not a valid student number"),
            })?;
        }
        Commands::Guard { id } => {
            let name = checkpoint.guard_name(&id).await;
            emit(json, &name, || name.clone())?;
        }
        Commands::Log { lines } => {
            let entries = checkpoint.recent_access(lines).await;
            emit(json, &entries, || describe_log(&entries))?;
        }
    }

    report_faults(checkpoint.faults().counts());
    Ok(())
}
