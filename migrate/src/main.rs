//! Version-gated migration runner.
//!
//! Reads `migrate.toml`, compares the recorded version in `.migrate/state.json`
//! with the component's target version, and applies the pending step
//! manifests under `updates/` in ascending order.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use update_migrate::core::version::{Version, compare_versions};
use update_migrate::exit_codes;
use update_migrate::io::config::load_config;
use update_migrate::io::init::{InitOptions, MigratePaths, init_project};
use update_migrate::io::lock::RunLock;
use update_migrate::io::run_log::{RunRecord, write_run_record};
use update_migrate::logging;
use update_migrate::migrator::Migrator;
use update_migrate::plan::{PlanOutcome, plan_from_root};

#[derive(Parser)]
#[command(
    name = "update-migrate",
    version,
    about = "Version-gated, resumable migrations for a versioned component"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `migrate.toml`, `updates/` and `.migrate/`.
    Init {
        /// Overwrite an existing `migrate.toml`.
        #[arg(short, long)]
        force: bool,
        /// Human-readable component name used in notices.
        #[arg(long)]
        name: String,
        /// Snake_case prefix for the version key and entry points.
        #[arg(long)]
        prefix: String,
        /// Version of the deployed artifact.
        #[arg(long, default_value = "0.1.0")]
        component_version: String,
    },
    /// Print the recorded and target versions.
    Status,
    /// Print the versions the next run would apply, one per line.
    Plan {
        /// Plan towards this version instead of `component.version`.
        #[arg(long)]
        target: Option<String>,
    },
    /// Apply pending steps and print the resulting notice.
    Run {
        /// Migrate towards this version instead of `component.version`.
        #[arg(long)]
        target: Option<String>,
        /// Render the notice as HTML instead of plain text.
        #[arg(long)]
        html: bool,
    },
    /// Print `<`, `=` or `>` for two version strings.
    Compare { a: String, b: String },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = Path::new(".");
    match cli.command {
        Command::Init {
            force,
            name,
            prefix,
            component_version,
        } => cmd_init(
            root,
            &InitOptions {
                force,
                name,
                prefix,
                version: component_version,
            },
        ),
        Command::Status => cmd_status(root),
        Command::Plan { target } => cmd_plan(root, target.as_deref()),
        Command::Run { target, html } => cmd_run(root, target.as_deref(), html),
        Command::Compare { a, b } => {
            println!("{}", ordering_symbol(compare_versions(&a, &b)));
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_init(root: &Path, options: &InitOptions) -> Result<i32> {
    let paths = init_project(root, options)?;
    println!("initialized {}", paths.config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_status(root: &Path) -> Result<i32> {
    match plan_from_root(root, None)? {
        PlanOutcome::Current { recorded, target } => {
            println!("current: recorded {recorded}, target {target}");
            Ok(exit_codes::OK)
        }
        PlanOutcome::Behind { from, to, path } => {
            let from = from.map_or_else(|| "unset".to_string(), |v| v.to_string());
            println!(
                "behind: recorded {from}, target {to}, {} step(s) pending",
                path.len()
            );
            Ok(exit_codes::BEHIND)
        }
    }
}

fn cmd_plan(root: &Path, target: Option<&str>) -> Result<i32> {
    if let PlanOutcome::Behind { path, .. } = plan_from_root(root, parse_target(target)?)? {
        for version in path {
            println!("{version}");
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, target: Option<&str>, html: bool) -> Result<i32> {
    let paths = MigratePaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    let target = parse_target(target)?;
    let _lock = RunLock::acquire(&paths.lock_path)?;

    let mut migrator = Migrator::from_config(root, &cfg, target)?;
    let Some(summary) = migrator.update().cloned() else {
        println!(
            "{} is current at {}",
            migrator.component().name,
            migrator.target()
        );
        return Ok(exit_codes::OK);
    };

    let record = RunRecord::from_report(
        &migrator.component().prefix,
        summary.from.as_ref().map(ToString::to_string),
        summary.path.iter().map(ToString::to_string).collect(),
        summary.applied.iter().map(ToString::to_string).collect(),
        &summary.reporter,
        Some(summary.duration_ms),
    );
    write_run_record(&paths.last_run_path, &record)?;

    let notice = if summary.succeeded() {
        migrator.success_notice()
    } else {
        migrator.failure_notice()
    }
    .context("run finished without a notice")?;
    let rendered = if html {
        notice.render_html()?
    } else {
        notice.render_text()?
    };
    println!("{rendered}");

    if summary.succeeded() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::FAILED)
    }
}

fn parse_target(target: Option<&str>) -> Result<Option<Version>> {
    target
        .map(|raw| Version::parse(raw).context("--target"))
        .transpose()
}

fn ordering_symbol(ordering: std::cmp::Ordering) -> &'static str {
    match ordering {
        std::cmp::Ordering::Less => "<",
        std::cmp::Ordering::Equal => "=",
        std::cmp::Ordering::Greater => ">",
    }
}
