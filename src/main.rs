//! PiCopy CLI - transfer files to and from a remote host over SFTP

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use crossbeam::channel::unbounded;
use picopy::config::{parse_remote_path, CliArgs, Commands, LogFormat, RemoteConfig, TransferSettings};
use picopy::history::{base_name, TransferLog};
use picopy::progress::{format_size, ChannelObserver, ProgressReporter};
use picopy::remote::{remote_join, RemoteAccess, SftpRemote};
use picopy::transfer::{BatchReport, Direction, JobStatus, TransferEngine, TransferJob};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// History file used when neither the CLI nor the settings file name one
const DEFAULT_HISTORY_FILE: &str = ".picopy_history.json";

fn main() {
    let args = CliArgs::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Warning: {:#}", e);
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &CliArgs) -> Result<()> {
    let level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("picopy={}", level)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match (&args.log_file, args.log_format) {
        (Some(path), format) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create log file {}", path.display()))?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Text => builder.try_init(),
            }
        }
        (None, LogFormat::Json) => builder.json().with_writer(std::io::stderr).try_init(),
        (None, LogFormat::Text) => builder.with_writer(std::io::stderr).try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}

fn run(args: CliArgs) -> Result<()> {
    let settings = TransferSettings::from_cli(&args)?;
    debug!(?settings, "Loaded settings");

    match &args.command {
        Commands::Put { paths } => cmd_put(&args, settings, paths),
        Commands::Get { paths } => cmd_get(&args, settings, paths),
        Commands::List { target } => cmd_list(&args, &settings, target),
        Commands::Mkdir { target } => {
            let (remote, path) = connect(&args, &settings, target)?;
            remote.mkdir(&path)?;
            println!("Created {}", path.display());
            Ok(())
        }
        Commands::Remove { target, dir } => {
            let (remote, path) = connect(&args, &settings, target)?;
            if *dir {
                remote.rmdir(&path)?;
            } else {
                remote.remove(&path)?;
            }
            println!("Removed {}", path.display());
            Ok(())
        }
        Commands::Rename { target, new_path } => {
            let (remote, path) = connect(&args, &settings, target)?;
            remote.rename(&path, new_path)?;
            println!("Renamed {} -> {}", path.display(), new_path.display());
            Ok(())
        }
        Commands::Log { clear } => cmd_log(&settings, *clear),
    }
}

/// Parse `user@host:/path`, open a session and resolve an empty path to
/// the default remote directory
fn connect(args: &CliArgs, settings: &TransferSettings, target: &str) -> Result<(Arc<SftpRemote>, PathBuf)> {
    let (user, host, path) = parse_remote_path(target)
        .ok_or_else(|| anyhow!("Invalid remote path '{}', expected user@host:/path", target))?;

    let config = RemoteConfig::from_cli(args, user, host);
    let remote = SftpRemote::new(config, settings.chunk_size);
    let path = resolve_remote_path(path, settings, &remote);

    info!(remote = %remote.config().display_name(), "Connecting");
    remote
        .connect()
        .with_context(|| format!("Cannot connect to {}", remote.config().display_name()))?;

    Ok((Arc::new(remote), path))
}

fn resolve_remote_path(path: PathBuf, settings: &TransferSettings, remote: &SftpRemote) -> PathBuf {
    if !path.as_os_str().is_empty() {
        path
    } else if !settings.default_remote_path.as_os_str().is_empty() {
        settings.default_remote_path.clone()
    } else {
        remote.home_path()
    }
}

fn cmd_put(args: &CliArgs, settings: TransferSettings, paths: &[String]) -> Result<()> {
    let (target, sources) = paths
        .split_last()
        .ok_or_else(|| anyhow!("Expected local sources followed by a remote target"))?;
    let (remote, target_dir) = connect(args, &settings, target)?;

    let jobs: Vec<TransferJob> = sources
        .iter()
        .map(|source| {
            let source = PathBuf::from(source);
            let destination = remote_join(&target_dir, &base_name(&source));
            TransferJob::new(source, destination)
        })
        .collect();

    run_batch(args, settings, remote, jobs, Direction::Upload)
}

fn cmd_get(args: &CliArgs, settings: TransferSettings, paths: &[String]) -> Result<()> {
    let (target, sources) = paths
        .split_last()
        .ok_or_else(|| anyhow!("Expected remote sources followed by a local directory"))?;
    let target_dir = PathBuf::from(target);

    let mut endpoint: Option<(String, String)> = None;
    let mut remote_paths = Vec::with_capacity(sources.len());
    for source in sources {
        let (user, host, path) = parse_remote_path(source)
            .ok_or_else(|| anyhow!("Invalid remote path '{}', expected user@host:/path", source))?;
        match &endpoint {
            Some((u, h)) if *u != user || *h != host => {
                bail!("All remote sources must be on the same host ({}@{})", u, h)
            }
            Some(_) => {}
            None => endpoint = Some((user, host)),
        }
        remote_paths.push(path);
    }

    let (user, host) = endpoint.ok_or_else(|| anyhow!("No remote sources given"))?;
    let remote = SftpRemote::new(RemoteConfig::from_cli(args, user, host), settings.chunk_size);
    remote
        .connect()
        .with_context(|| format!("Cannot connect to {}", remote.config().display_name()))?;

    std::fs::create_dir_all(&target_dir)
        .with_context(|| format!("Cannot create {}", target_dir.display()))?;

    let jobs: Vec<TransferJob> = remote_paths
        .into_iter()
        .map(|path| {
            let path = resolve_remote_path(path, &settings, &remote);
            let destination = target_dir.join(base_name(&path));
            TransferJob::new(path, destination)
        })
        .collect();

    run_batch(args, settings, Arc::new(remote), jobs, Direction::Download)
}

/// Run one batch with a terminal progress display and persist the history
fn run_batch(
    args: &CliArgs,
    settings: TransferSettings,
    remote: Arc<SftpRemote>,
    jobs: Vec<TransferJob>,
    direction: Direction,
) -> Result<()> {
    let history = history_path(&settings);
    let log = match &history {
        Some(path) => TransferLog::load(path, settings.log_capacity)?,
        None => TransferLog::with_capacity(settings.log_capacity),
    };

    let (tx, rx) = unbounded();
    let engine = TransferEngine::new(remote.clone(), settings)
        .with_observer(Arc::new(ChannelObserver::new(tx)))
        .with_log(log);

    let handle = engine.try_submit(jobs, direction)?;

    let reporter = if args.quiet {
        ProgressReporter::disabled()
    } else {
        ProgressReporter::new()
    };
    reporter.run_while(rx, || !handle.is_finished());

    let report = handle.wait()?;

    if let Some(path) = &history {
        engine
            .save_log(path)
            .with_context(|| format!("Cannot save history to {}", path.display()))?;
    }
    remote.disconnect();

    if !args.quiet {
        print_summary(&report);
    }

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    println!();
    println!("=== Transfer Summary ===");
    println!("Direction:   {}", report.direction);
    println!("Files:       {}", report.files_transferred());
    println!("Bytes:       {}", format_size(report.bytes_transferred() as f64));
    println!("Duration:    {:.2}s", report.duration.as_secs_f64());

    for outcome in report.unsuccessful() {
        let name = outcome.job.name();
        match &outcome.status {
            JobStatus::Failed(message) => println!("  FAILED   {}: {}", name, message),
            JobStatus::Partial { failures, .. } => {
                println!("  PARTIAL  {} ({} entries failed)", name, failures.len());
                for (path, message) in failures {
                    println!("           {}: {}", path.display(), message);
                }
            }
            JobStatus::Cancelled { files, .. } => {
                println!("  CANCELLED {} ({} files finished)", name, files)
            }
            JobStatus::Skipped => println!("  SKIPPED  {}", name),
            JobStatus::Completed { .. } => {}
        }
    }
}

fn cmd_list(args: &CliArgs, settings: &TransferSettings, target: &str) -> Result<()> {
    let (remote, path) = connect(args, settings, target)?;
    let mut entries = remote.list(&path)?;
    entries.sort_by(|a, b| (!a.is_dir, &a.name).cmp(&(!b.is_dir, &b.name)));

    for entry in entries {
        let modified = chrono::DateTime::from_timestamp(entry.mtime as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        if entry.is_dir {
            println!("{:>10}  {}  {}/", "-", modified, entry.name);
        } else {
            println!("{:>10}  {}  {}", format_size(entry.size as f64), modified, entry.name);
        }
    }
    Ok(())
}

fn cmd_log(settings: &TransferSettings, clear: bool) -> Result<()> {
    let path = history_path(settings).ok_or_else(|| anyhow!("No history file configured"))?;
    let mut log = TransferLog::load(&path, settings.log_capacity)?;

    if clear {
        log.clear();
        log.save(&path)?;
        println!("Transfer history cleared");
        return Ok(());
    }

    if log.is_empty() {
        println!("No transfers recorded");
        return Ok(());
    }

    for entry in log.entries() {
        let size = entry
            .size
            .map(|s| format_size(s as f64))
            .unwrap_or_else(|| "-".to_string());
        let duration = entry
            .duration
            .map(|d| format!("{:.2}s", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<8}  {:>10}  {:>8}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action.as_str(),
            size,
            duration,
            entry.filename
        );
    }
    Ok(())
}

fn history_path(settings: &TransferSettings) -> Option<PathBuf> {
    settings.history_file.clone().or_else(|| {
        std::env::var_os("HOME").map(|home| Path::new(&home).join(DEFAULT_HISTORY_FILE))
    })
}
