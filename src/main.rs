use std::path::Path;

use clap::Parser;
use sinkguard::audit;
use sinkguard::cli::{Cli, Commands};
use sinkguard::engine;
use sinkguard::policy::model::PolicyModel;

fn db_path() -> std::path::PathBuf {
    dirs_path().join("sinkguard.db")
}

fn dirs_path() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = std::path::PathBuf::from(home).join(".sinkguard");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            sink,
            value,
            json,
            path,
        } => {
            cmd_check(&cli.policy, &sink, &value, json, path)?;
        }
        Commands::Lint => {
            cmd_lint(&cli.policy)?;
        }
        Commands::Audit {
            tail,
            export,
            format,
        } => {
            cmd_audit(tail, export, &format)?;
        }
        Commands::Stats => {
            cmd_stats()?;
        }
        Commands::Init => {
            cmd_init(&cli.policy)?;
        }
    }

    Ok(())
}

fn cmd_check(
    policy_path: &Path,
    sink: &str,
    value: &str,
    json: bool,
    path: bool,
) -> anyhow::Result<()> {
    let policy = PolicyModel::load_from_path(policy_path)?;

    let decision = if path {
        policy.sink(sink)?.decide_path(Path::new(value))?
    } else if json {
        let parsed: serde_json::Value = serde_json::from_str(value)?;
        engine::decide(&policy, sink, &parsed)?
    } else {
        engine::decide(&policy, sink, &serde_json::Value::String(value.to_string()))?
    };

    println!("{}", serde_json::to_string_pretty(&decision)?);

    // Exit nonzero on block so shell pipelines can gate on the verdict.
    if decision.is_block() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_lint(policy_path: &Path) -> anyhow::Result<()> {
    match PolicyModel::load_from_path(policy_path) {
        Ok(policy) => {
            println!("Policy OK: {}", policy_path.display());
            println!("  Version:    {}", policy.version());
            println!("  Validators: {}", policy.validator_count());
            println!("  Sinks:      {}", policy.sink_count());
            Ok(())
        }
        Err(e) => {
            println!("Policy invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_audit(tail: usize, export: bool, format: &str) -> anyhow::Result<()> {
    let db = db_path();
    if !db.exists() {
        println!("No audit database found. Run 'sinkguard init' first.");
        return Ok(());
    }

    let conn = audit::open_db(&db)?;

    if export {
        match format {
            "csv" => {
                let csv = audit::export::export_csv(&conn)?;
                print!("{}", csv);
            }
            _ => {
                let json = audit::export::export_json(&conn)?;
                println!("{}", json);
            }
        }
    } else {
        let records = audit::query_recent(&conn, tail)?;
        if records.is_empty() {
            println!("No audit entries found.");
        } else {
            println!(
                "{:<26} {:<18} {:<18} {:<10} {:<22} {}",
                "TIMESTAMP", "SINK", "VALIDATOR", "ACTION", "REASON", "DETAIL"
            );
            println!("{}", "─".repeat(120));
            for record in &records {
                println!(
                    "{:<26} {:<18} {:<18} {:<10} {:<22} {}",
                    record.timestamp,
                    record.sink,
                    record.validator,
                    record.action,
                    record.reason,
                    record.detail
                );
            }
        }
    }
    Ok(())
}

fn cmd_stats() -> anyhow::Result<()> {
    let db = db_path();
    if db.exists() {
        let conn = audit::open_db(&db)?;
        let stats = audit::query_stats(&conn)?;

        println!("sinkguard Decision Stats");
        println!("────────────────────────");
        println!("Total decisions: {}", stats.total);
        println!("  Allowed:   {}", stats.allowed);
        println!("  Warned:    {}", stats.warned);
        println!("  Blocked:   {}", stats.blocked);
        println!("  Forbidden: {}", stats.forbidden);
    } else {
        println!("sinkguard Stats: No audit database found.");
        println!("Run 'sinkguard init' to create one.");
    }
    Ok(())
}

fn cmd_init(policy_path: &Path) -> anyhow::Result<()> {
    println!("Initializing sinkguard...");

    // Create data directory
    let data_dir = dirs_path();
    std::fs::create_dir_all(&data_dir)?;
    println!("  Created data dir: {}", data_dir.display());

    // Initialize database
    let db = db_path();
    audit::open_db(&db)?;
    println!("  Initialized database: {}", db.display());

    // Create default policy if not exists
    if !policy_path.exists() {
        let default_policy = include_str!("../templates/default.toml");
        std::fs::write(policy_path, default_policy)?;
        println!("  Created policy: {}", policy_path.display());
    } else {
        println!("  Policy already exists: {}", policy_path.display());
    }

    println!("\nDone! Next steps:");
    println!("  1. Review the policy:  {}", policy_path.display());
    println!("  2. Lint it:            sinkguard lint");
    println!("  3. Try a check:        sinkguard check file_write report.txt");
    Ok(())
}
