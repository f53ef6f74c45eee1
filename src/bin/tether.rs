//! Tether CLI Binary
//!
//! Command-line interface for the Tether directory replicator: serve a
//! replica, mirror a directory continuously, run a one-shot sync, or print
//! the commands a sync would issue.

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tether::channel::{self, CommandChannel, TcpChannel};
use tether::command::Command;
use tether::config::{ConfigLoader, TetherConfig};
use tether::error::ReplicationError;
use tether::fs::local::canonical_root;
use tether::fs::{FileSystem, LocalFs};
use tether::logging::{init_logging, LoggingConfig};
use tether::source::{Reconciler, SourceReplicator};
use tether::target::CommandInterpreter;
use tracing::{error, info};

/// Tether - one-way, near-real-time directory tree replication
#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Mirror a directory tree to a remote replica")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable logging output
    #[arg(long)]
    quiet: bool,

    /// Enable verbose logging (level: debug)
    #[arg(long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a replica directory for a remote source
    Serve {
        /// Replica root directory (created if missing)
        #[arg(long)]
        root: PathBuf,

        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:7878")]
        listen: String,
    },
    /// Reconcile once, then mirror changes until killed
    Mirror {
        /// Source root directory
        #[arg(long)]
        root: PathBuf,

        /// Address of the serving replica
        #[arg(long)]
        connect: String,
    },
    /// One-shot reconciliation
    Sync {
        /// Source root directory
        #[arg(long)]
        root: PathBuf,

        /// Address of the serving replica
        #[arg(long)]
        connect: String,
    },
    /// Print the commands a sync would issue, without sending them
    Plan {
        /// Source root directory
        #[arg(long)]
        root: PathBuf,

        /// Address of the serving replica
        #[arg(long)]
        connect: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = load_config(&cli);
    let logging_config = build_logging_config(&cli, &config);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = execute(&cli, &config) {
        error!("Command failed: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> TetherConfig {
    match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    }
}

/// Build logging configuration. Precedence: CLI flags over environment over
/// config file over defaults.
fn build_logging_config(cli: &Cli, config: &TetherConfig) -> LoggingConfig {
    let mut logging = config.logging.clone();

    if cli.quiet {
        logging.level = "off".to_string();
    }
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        logging.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        logging.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        logging.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        logging.file = Some(file.clone());
    }

    logging
}

fn execute(cli: &Cli, config: &TetherConfig) -> Result<(), ReplicationError> {
    match &cli.command {
        Commands::Serve { root, listen } => serve(root, listen),
        Commands::Mirror { root, connect } => mirror(root, connect, config),
        Commands::Sync { root, connect } => sync(root, connect),
        Commands::Plan { root, connect } => plan(root, connect),
    }
}

fn serve(root: &Path, listen: &str) -> Result<(), ReplicationError> {
    let fs = Arc::new(LocalFs::new());
    fs.make_dirs(root)?;
    let root = canonical_root(root)?;

    let interpreter = CommandInterpreter::new(fs as Arc<dyn FileSystem>, root);
    let listener = TcpListener::bind(listen).map_err(tether::error::ChannelError::from)?;
    channel::serve(listener, &interpreter)?;
    Ok(())
}

fn mirror(root: &Path, connect: &str, config: &TetherConfig) -> Result<(), ReplicationError> {
    let fs = Arc::new(LocalFs::new());
    let root = canonical_root(root)?;
    let channel = Arc::new(TcpChannel::connect(connect)?);

    let replicator = SourceReplicator::new(
        fs as Arc<dyn FileSystem>,
        root,
        channel as Arc<dyn CommandChannel>,
        &config.replication,
    );
    let stats = replicator.start()?;
    info!(
        files_written = stats.files_written,
        removed = stats.removed,
        "Initial reconciliation done, mirroring changes"
    );
    replicator.run()
}

fn sync(root: &Path, connect: &str) -> Result<(), ReplicationError> {
    let fs = LocalFs::new();
    let root = canonical_root(root)?;
    let channel = TcpChannel::connect(connect)?;

    let stats = Reconciler::new(&fs, &root, &channel).run()?;
    println!(
        "Synced: {} dirs created, {} files written, {} unchanged, {} removed ({} commands)",
        stats.dirs_created,
        stats.files_written,
        stats.files_unchanged,
        stats.removed,
        stats.commands_issued
    );
    Ok(())
}

fn plan(root: &Path, connect: &str) -> Result<(), ReplicationError> {
    let fs = LocalFs::new();
    let root = canonical_root(root)?;
    let channel = TcpChannel::connect(connect)?;

    let commands = Reconciler::new(&fs, &root, &channel).plan()?;
    if commands.is_empty() {
        println!("Target is already an exact mirror.");
        return Ok(());
    }
    for command in &commands {
        match command {
            Command::MakeDir { path } => println!("{} {}/", "+".green(), path),
            Command::WriteFile { path, content } => {
                println!("{} {} ({} bytes)", "~".yellow(), path, content.len())
            }
            Command::Remove { path } => println!("{} {}", "-".red(), path),
            Command::GetDirStructure => {}
        }
    }
    println!("{} commands", commands.len());
    Ok(())
}
