//! Configuration settings for PiCopy
//!
//! Defines CLI arguments, the on-disk transfer settings file, and the
//! remote host configuration used by the SFTP adapter.

use crate::error::{IoResultExt, Result, TransferError};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted chunk size; each transfer allocates one chunk buffer
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// PiCopy - copy files and directories to and from a remote host over SFTP
#[derive(Parser, Debug, Clone)]
#[command(name = "picopy")]
#[command(author = "PiCopy Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Copy files and directory trees to and from a remote host over SFTP")]
#[command(long_about = r#"
PiCopy transfers files and directory trees between this machine and a remote
host (typically a Raspberry Pi) over SFTP, with live progress and a bounded
transfer history.

Examples:
  picopy put notes.txt photos/ pi@raspberrypi:/home/pi     # Upload a batch
  picopy get pi@raspberrypi:/home/pi/logs ./backup         # Download a directory
  picopy ls pi@raspberrypi:/home/pi                        # List a remote directory
  picopy log                                               # Show transfer history
"#)]
pub struct CliArgs {
    /// SSH port
    #[arg(short = 'P', long, default_value = "22", value_name = "PORT", global = true)]
    pub port: u16,

    /// SSH private key path
    #[arg(short = 'i', long, value_name = "PATH", global = true)]
    pub key: Option<PathBuf>,

    /// SSH password (falls back to the SSH agent when neither key nor password is set)
    #[arg(long, env = "PICOPY_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10", value_name = "SECS", global = true)]
    pub timeout: u64,

    /// Settings file (JSON)
    #[arg(short = 'c', long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Chunk size for streaming (e.g., 128K, 1M); overrides the settings file
    #[arg(long, value_name = "SIZE", global = true)]
    pub chunk_size: Option<String>,

    /// Keep partially written files when a transfer is cancelled or fails
    #[arg(long, global = true)]
    pub keep_partial: bool,

    /// Transfer history file; overrides the settings file
    #[arg(long, value_name = "PATH", global = true)]
    pub history: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no progress bars)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Log file path
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Upload local files or directories into a remote directory
    #[command(name = "put")]
    Put {
        /// Local sources followed by the remote target directory (user@host:/path)
        #[arg(required = true, num_args = 2.., value_name = "PATHS")]
        paths: Vec<String>,
    },

    /// Download remote files or directories into a local directory
    #[command(name = "get")]
    Get {
        /// Remote sources (user@host:/path) followed by the local target directory
        #[arg(required = true, num_args = 2.., value_name = "PATHS")]
        paths: Vec<String>,
    },

    /// List a remote directory
    #[command(name = "ls")]
    List {
        /// Remote directory (user@host:/path)
        target: String,
    },

    /// Create a remote directory
    #[command(name = "mkdir")]
    Mkdir {
        /// Remote directory (user@host:/path)
        target: String,
    },

    /// Remove a remote file or empty directory
    #[command(name = "rm")]
    Remove {
        /// Remote path (user@host:/path)
        target: String,
        /// Remove an empty directory instead of a file
        #[arg(short, long)]
        dir: bool,
    },

    /// Rename a remote file or directory
    #[command(name = "mv")]
    Rename {
        /// Remote path (user@host:/path)
        target: String,
        /// New remote path on the same host
        new_path: PathBuf,
    },

    /// Show or clear the transfer history
    #[command(name = "log")]
    Log {
        /// Clear the history instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON lines
    Json,
}

/// What to do with a destination file left incomplete by a cancelled or failed transfer
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartialFilePolicy {
    /// Delete the partial destination
    #[default]
    Remove,
    /// Leave the truncated destination in place
    Keep,
}

/// Transfer engine settings, loadable from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Bytes per streamed chunk
    pub chunk_size: usize,
    /// Number of transfer log entries retained
    pub log_capacity: usize,
    /// Partial destination handling
    pub partial_file_policy: PartialFilePolicy,
    /// Sort directory entries by name before walking
    pub sort_entries: bool,
    /// Remote directory used when a target omits the path
    pub default_remote_path: PathBuf,
    /// Where the transfer log is persisted
    pub history_file: Option<PathBuf>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size: 128 * 1024,
            log_capacity: crate::history::DEFAULT_LOG_CAPACITY,
            partial_file_policy: PartialFilePolicy::Remove,
            sort_entries: true,
            default_remote_path: PathBuf::from("/home/pi"),
            history_file: None,
        }
    }
}

impl TransferSettings {
    /// Load settings from a JSON file, using defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).with_path(path)?;
        let settings: Self = serde_json::from_str(&data)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_path(path)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(TransferError::config("chunk_size must be greater than zero"));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(TransferError::config(format!(
                "chunk_size must not exceed {} bytes",
                MAX_CHUNK_SIZE
            )));
        }
        if self.log_capacity == 0 {
            return Err(TransferError::config("log_capacity must be greater than zero"));
        }
        Ok(())
    }

    /// Build settings from CLI arguments layered over the settings file
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut settings = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(chunk) = &args.chunk_size {
            let bytes = parse_size(chunk)
                .map_err(|e| TransferError::config(format!("Invalid chunk size: {}", e)))?;
            settings.chunk_size = usize::try_from(bytes)
                .map_err(|_| TransferError::config(format!("Chunk size too large: {}", chunk)))?;
        }
        if args.keep_partial {
            settings.partial_file_policy = PartialFilePolicy::Keep;
        }
        if let Some(history) = &args.history {
            settings.history_file = Some(history.clone());
        }

        settings.validate()?;
        Ok(settings)
    }
}

/// Remote host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote hostname or IP
    pub host: String,
    /// Username
    pub user: String,
    /// Port
    pub port: u16,
    /// SSH key path
    pub key_path: Option<PathBuf>,
    /// Password for password authentication
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Connect timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::from("pi"),
            port: 22,
            key_path: None,
            password: None,
            timeout_secs: 10,
        }
    }
}

impl RemoteConfig {
    /// Build a config for `user@host` using the connection options from the CLI
    pub fn from_cli(args: &CliArgs, user: String, host: String) -> Self {
        Self {
            host,
            user,
            port: args.port,
            key_path: args.key.clone(),
            password: args.password.clone(),
            timeout_secs: args.timeout,
        }
    }

    /// Display name in the form user@host:port
    pub fn display_name(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("GB") || size.ends_with('G') {
        (size.trim_end_matches(|c| c == 'G' || c == 'B'), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        (size.trim_end_matches(|c| c == 'M' || c == 'B'), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        (size.trim_end_matches(|c| c == 'K' || c == 'B'), 1024u64)
    } else if size.ends_with('B') {
        (size.trim_end_matches('B'), 1u64)
    } else {
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    Ok((num * multiplier as f64) as u64)
}

/// Parse remote path (user@host:/path)
///
/// An empty path part (`user@host:`) yields an empty `PathBuf`; callers
/// substitute their default remote directory.
pub fn parse_remote_path(path: &str) -> Option<(String, String, PathBuf)> {
    let (user_host, remote_path) = path.split_once(':')?;
    let (user, host) = user_host.split_once('@')?;
    if user.is_empty() || host.is_empty() {
        return None;
    }
    Some((user.to_string(), host.to_string(), PathBuf::from(remote_path)))
}
