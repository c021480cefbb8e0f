use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

use gitbridge::config::ConfigLoader;
use gitbridge::executor::GitExecutor;
use gitbridge::git::{GitClient, GitLog, GitReader, GitRef, GitWriter, LogOptions};
use gitbridge::transport::GitBridge;
use gitbridge::BridgeError;

#[derive(Parser)]
#[command(name = "gitbridge")]
#[command(about = "Stream git output through a serialized command bridge", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: user config dir gitbridge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run git in this directory
    #[arg(short = 'C', long = "directory", global = true)]
    directory: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the commit log with decorations
    Log(LogArgs),
    /// List references
    Refs {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the current branch name
    Branch,
    /// Print the git version
    Version,
    /// Fetch from a remote
    Fetch {
        /// Remote to fetch (default: the configured upstream)
        remote: Option<String>,
    },
    /// Run an arbitrary git command and stream its output
    Exec {
        /// Arguments passed to git
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}

#[derive(Args)]
struct LogArgs {
    /// Limit the number of commits
    #[arg(short = 'n', long)]
    max_count: Option<u32>,

    /// Skip this many commits first
    #[arg(long)]
    skip: Option<u32>,

    /// Include every ref
    #[arg(long)]
    all: bool,

    /// Include local branches
    #[arg(long)]
    branches: bool,

    /// Include tags
    #[arg(long)]
    tags: bool,

    /// Include remote-tracking branches
    #[arg(long)]
    remotes: bool,

    /// Only show decorated commits
    #[arg(long)]
    simplify: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

impl LogArgs {
    /// Without selection flags the default (all refs, simplified) applies.
    fn options(&self) -> LogOptions {
        let selected =
            self.all || self.branches || self.tags || self.remotes || self.simplify;
        let base = if selected {
            LogOptions {
                all: self.all,
                branches: self.branches,
                tags: self.tags,
                remotes: self.remotes,
                simplify: self.simplify,
                ..LogOptions::none()
            }
        } else {
            LogOptions::default()
        };
        LogOptions {
            max_count: self.max_count,
            skip: self.skip,
            ..base
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("gitbridge started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        match e.downcast_ref::<BridgeError>() {
            Some(bridge_error) => eprintln!("Error: {}", bridge_error.user_message()),
            None => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ConfigLoader::new()
        .with_path(cli.config)
        .load()
        .await
        .map_err(BridgeError::from)
        .context("Failed to load configuration")?;
    if let Some(dir) = cli.directory {
        config.working_dir = Some(dir);
    }
    debug!("Using configuration: {:?}", config);

    let bridge = GitBridge::new(GitExecutor::from_config(&config));
    let client = GitClient::new(bridge.clone());

    match cli.command {
        Commands::Log(args) => {
            let logs = client.log(&args.options()).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&logs)?);
            } else {
                for log in &logs {
                    println!("{}", format_log(log));
                }
            }
        }
        Commands::Refs { json } => {
            let refs = client.show_ref().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&refs)?);
            } else {
                for git_ref in &refs {
                    println!("{}", format_ref(git_ref));
                }
            }
        }
        Commands::Branch => println!("{}", client.current_branch().await?),
        Commands::Version => println!("{}", client.version().await?),
        Commands::Fetch { remote } => client.fetch(remote.as_deref()).await?,
        Commands::Exec { args } => {
            let id = bridge.exec(args);
            let mut lines = bridge.open::<String>(id).await.map_err(BridgeError::from)?;
            while let Some(line) = lines.next().await {
                println!("{}", line.map_err(BridgeError::from)?);
            }
        }
    }

    Ok(())
}

fn format_log(log: &GitLog) -> String {
    let mut line = format!("{} {} {}", log.short_hash(), log.date, log.author);
    if !log.refs.is_empty() {
        let names: Vec<String> = log
            .refs
            .iter()
            .map(|r| {
                if r.current {
                    format!("HEAD -> {}", r.name)
                } else {
                    r.name.clone()
                }
            })
            .collect();
        line.push_str(&format!(" ({})", names.join(", ")));
    }
    line.push(' ');
    line.push_str(&log.subject);
    line
}

fn format_ref(git_ref: &GitRef) -> String {
    format!("{} {:<6} {}", git_ref.hash, git_ref.ref_type, git_ref.name)
}
