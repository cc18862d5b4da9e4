mod actions;
mod api;
mod collectors;
mod config;
mod error;
mod exec;
mod logging;
mod models;
mod util;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "btrdash", about = "btrfs, snapper and block device overview and actions", version = "0.1")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides the config file)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the JSON body of a read endpoint, e.g. /api/btrfs
    Get {
        endpoint: String,
    },
    /// Run a write endpoint, e.g. /api/mount '{"uuid": "..."}'
    Post {
        endpoint: String,
        /// JSON request body
        body: String,
    },
    /// Print a human-readable overview of everything the read endpoints report
    Summary {
        /// Print one combined JSON snapshot instead
        #[arg(long)]
        json: bool,
    },
    /// Print config file path and current values, then exit
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::Config::load(cli.config.as_deref());
    logging::init(cli.log_level.as_deref().unwrap_or(&cfg.logging.level));

    let exec = exec::SystemExecutor::new(
        cfg.general.command_timeout_secs,
        cfg.general.long_command_timeout_secs,
    );
    let ctx = api::Context { exec: &exec, actions: &cfg.actions };

    match cli.command {
        Command::Get { endpoint }        => run_get(&ctx, &endpoint),
        Command::Post { endpoint, body } => run_post(&ctx, &endpoint, &body),
        Command::Summary { json: true }  => run_json_snapshot(&ctx),
        Command::Summary { json: false } => run_summary(&ctx),
        Command::Config                  => run_print_config(&cfg, cli.config.as_deref()),
    }
}

fn run_get(ctx: &api::Context, endpoint: &str) -> Result<()> {
    let resp = api::get(ctx, endpoint);
    println!("{}", serde_json::to_string_pretty(&resp.body)?);
    if !resp.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_post(ctx: &api::Context, endpoint: &str, body: &str) -> Result<()> {
    let body: serde_json::Value = serde_json::from_str(body).context("request body is not valid JSON")?;

    if !ctx.actions.read_only && !nix::unistd::Uid::effective().is_root() {
        tracing::warn!("not running as root; mount, mkfs and balance will likely be refused");
    }

    let resp = api::post(ctx, endpoint, &body);
    println!("{}", serde_json::to_string_pretty(&resp.body)?);
    if !resp.is_success() {
        tracing::debug!(status = resp.status, endpoint, "request failed");
        std::process::exit(1);
    }
    Ok(())
}

fn run_json_snapshot(ctx: &api::Context) -> Result<()> {
    use serde_json::{json, Map, Value};

    let mut snapshot = Map::new();
    snapshot.insert("btrdash_version".into(), json!("0.1"));
    snapshot.insert("timestamp".into(), json!(chrono::Local::now().to_rfc3339()));

    for endpoint in api::READ_ENDPOINTS {
        let key = endpoint.trim_start_matches("/api/");
        let resp = api::get(ctx, endpoint);
        let value = if resp.is_success() { resp.body } else { Value::Null };
        snapshot.insert(key.to_string(), value);
    }

    println!("{}", serde_json::to_string_pretty(&Value::Object(snapshot))?);
    Ok(())
}

fn run_summary(ctx: &api::Context) -> Result<()> {
    use util::report;
    let overview = report::collect(ctx.exec);
    print!("{}", report::generate(&overview));
    Ok(())
}

fn run_print_config(cfg: &config::Config, explicit: Option<&Path>) -> Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(config::Config::config_path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  command_timeout_secs      = {}s", cfg.general.command_timeout_secs);
    println!("  long_command_timeout_secs = {}s", cfg.general.long_command_timeout_secs);
    println!();
    println!("[actions]");
    println!("  read_only                    = {}", cfg.actions.read_only);
    println!("  mount_root                   = {}", cfg.actions.mount_root.display());
    println!("  default_snapshot_description = {:?}", cfg.actions.default_snapshot_description);
    println!();
    println!("[logging]");
    println!("  level = {}", cfg.logging.level);
    Ok(())
}
