//! ebs-retention: scheduled EBS snapshot backups
//!
//! `run` performs one backup-and-retention pass; `scan` shows which owned
//! snapshots the next pass would delete.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use ebs_retention::aws::{AwsContext, Ec2Client};
use ebs_retention::config::{BackupOptions, RunFlags};
use ebs_retention::run_state::RunState;
use ebs_retention::sweeper::{RetentionSweeper, evaluate};
use ebs_retention::{RunSummary, run_for_account};
use ebs_retention_common::tags::{TAG_EXPIRATION_TIME, TAG_INSTANCE_ID};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ebs-retention")]
#[command(about = "Scheduled EBS snapshot backups with tag-driven retention")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every command
#[derive(clap::Args, Debug)]
struct CommonArgs {
    /// JSON options file (defaults apply when omitted)
    #[arg(short, long, env = "EBS_RETENTION_CONFIG")]
    config: Option<PathBuf>,

    /// AWS region (defaults to the provider chain)
    #[arg(long)]
    region: Option<String>,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up every eligible instance, then delete expired snapshots
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Log intended creates and deletes without making them
        #[arg(long)]
        dry_run: bool,

        /// Summary format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List owned snapshots with their expiry and retention verdict
    Scan {
        #[command(flatten)]
        common: CommonArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        report_failure(&e);
        std::process::exit(1);
    }
}

/// Write the error and each of its causes to stderr
fn report_failure(error: &anyhow::Error) {
    eprintln!("\x1b[1;31mebs-retention failed:\x1b[0m {error}");
    for (depth, cause) in error.chain().skip(1).enumerate() {
        eprintln!("{:indent$}\x1b[33m-> \x1b[0m{cause}", "", indent = 2 * (depth + 1));
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match args.command {
        Command::Run {
            common,
            dry_run,
            format,
        } => handle_run(common, dry_run, format).await,
        Command::Scan { common, format } => handle_scan(common, format).await,
    }
}

/// Load options and AWS configuration once for the command
async fn setup(common: &CommonArgs) -> Result<(BackupOptions, AwsContext)> {
    let options = BackupOptions::load_or_default(common.config.as_deref())
        .context("Failed to load backup options")?;

    if let Some(profile) = &common.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }
    let aws = AwsContext::load(common.region.as_deref(), common.aws_profile.as_deref()).await;
    info!(region = aws.region().unwrap_or("unset"), "AWS configuration loaded");

    Ok((options, aws))
}

/// Handle the run command
async fn handle_run(common: CommonArgs, dry_run: bool, format: OutputFormat) -> Result<()> {
    let (options, aws) = setup(&common).await?;

    info!(
        retention_days = options.retention_days,
        retention_weeks = options.retention_weeks,
        retention_months = options.retention_months,
        volume_selection = ?options.volume_selection,
        dry_run,
        "Starting backup run"
    );

    let summary = run_for_account(&aws, &options, RunFlags { dry_run }, Utc::now()).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Table => print_summary(&summary),
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let b = &summary.backup;
    let s = &summary.sweep;
    println!(
        "Instances: {} seen, {} excluded, {} backed up, {} without EBS volumes, {} failed",
        b.instances_seen, b.excluded, b.backed_up, b.nothing_to_back_up, b.failed
    );
    if b.planned > 0 {
        println!("Snapshots: {} would be created", b.planned);
    } else {
        println!("Snapshots: {} created", b.snapshots_created);
    }
    println!(
        "Retention: {} found, {} deleted, {} already gone, {} failed, {} held, {} kept, {} skipped",
        s.found,
        s.deleted,
        s.already_deleted,
        s.failed,
        s.held_for_failed_instance,
        s.not_expired,
        s.skipped
    );
    if s.would_delete > 0 {
        println!("Retention: {} would be deleted", s.would_delete);
    }
    if !summary.failed_instances.is_empty() {
        println!("Failed instances: {}", summary.failed_instances.join(", "));
    }
}

/// Handle the scan command
async fn handle_scan(common: CommonArgs, format: OutputFormat) -> Result<()> {
    let (_options, aws) = setup(&common).await?;
    let ec2 = Ec2Client::from_context(&aws);

    let sweeper = RetentionSweeper::new(&ec2, RunFlags { dry_run: true });
    let snapshots = sweeper.list_owned().await?;

    if snapshots.is_empty() {
        println!("No snapshots created by ebs-retention found.");
        return Ok(());
    }

    let now = Utc::now();
    let run_state = RunState::new();

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = snapshots
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "snapshot_id": s.snapshot_id,
                        "instance_id": s.tag(TAG_INSTANCE_ID),
                        "expiration_time": s.tag(TAG_EXPIRATION_TIME),
                        "description": s.description,
                        "verdict": evaluate(s, &run_state, now).as_str(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => {
            println!(
                "{:<24} {:<21} {:<28} {:<22}",
                "SNAPSHOT", "INSTANCE", "EXPIRES", "VERDICT"
            );
            println!("{}", "-".repeat(96));
            for s in &snapshots {
                println!(
                    "{:<24} {:<21} {:<28} {:<22}",
                    s.snapshot_id,
                    s.tag(TAG_INSTANCE_ID).unwrap_or("-"),
                    s.tag(TAG_EXPIRATION_TIME).unwrap_or("-"),
                    evaluate(s, &run_state, now).as_str(),
                );
            }
            println!("\nTotal: {} snapshot(s)", snapshots.len());
        }
    }

    Ok(())
}
