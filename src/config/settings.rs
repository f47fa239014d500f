//! Configuration settings for s3csecmd
//!
//! Defines the CLI arguments and the runtime configuration handed to the
//! transfer client.

use crate::core::DEFAULT_WORKERS;
use crate::error::{CseError, Result};
use crate::storage::{is_remote_locator, S3Location};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable overriding the worker pool capacity
pub const WORKERS_ENV: &str = "S3CSE_WORKERS";

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// s3csecmd - S3 bulk copy with client-side encryption
#[derive(Parser, Debug, Clone)]
#[command(name = "s3csecmd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Copy directory trees to and from S3 with client-side envelope encryption")]
#[command(long_about = r#"
s3csecmd copies a local directory tree into an S3 prefix, or an S3 prefix
into a local directory. Every object is encrypted on the client with a fresh
data key wrapped by AWS KMS before it leaves the machine.

Examples:
  s3csecmd cp ./reports s3://bucket/reports --kms-id alias/backup
  s3csecmd cp s3://bucket/reports ./restore
  S3CSE_WORKERS=32 s3csecmd cp ./data s3://bucket/data
"#)]
pub struct CliArgs {
    /// KMS key id, alias or ARN used to wrap data keys
    #[arg(long, env = "KMS_ID", value_name = "KEY")]
    pub kms_id: String,

    /// AWS access key id (requires --secret-key)
    #[arg(long, value_name = "ID", requires = "secret_key")]
    pub access_key: Option<String>,

    /// AWS secret access key (requires --access-key)
    #[arg(long, value_name = "SECRET", requires = "access_key")]
    pub secret_key: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION, value_name = "REGION")]
    pub region: String,

    /// Custom endpoint for S3-compatible services
    #[arg(long, env = "AWS_ENDPOINT_URL", value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Show a progress spinner
    #[arg(long)]
    pub progress: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Copy between a local directory and an S3 prefix
    #[command(name = "cp")]
    Cp {
        /// Source (local path or s3://bucket/prefix)
        #[arg(value_name = "SOURCE")]
        source: String,
        /// Destination (local path or s3://bucket/prefix)
        #[arg(value_name = "DEST")]
        destination: String,
    },
}

/// Resolved copy direction of a `cp` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyDirection {
    /// Remote folder into a local directory
    Download {
        /// Folder to list
        source: S3Location,
        /// Directory to write into
        dest: PathBuf,
    },
    /// Local directory into a remote folder
    Upload {
        /// Directory to walk
        source: PathBuf,
        /// Folder to write into
        dest: S3Location,
    },
}

impl Commands {
    /// Decide the direction; exactly one operand must be an s3 locator
    pub fn direction(&self) -> Result<CopyDirection> {
        let Commands::Cp {
            source,
            destination,
        } = self;

        match (is_remote_locator(source), is_remote_locator(destination)) {
            (true, false) => Ok(CopyDirection::Download {
                source: S3Location::parse(source)?,
                dest: PathBuf::from(destination),
            }),
            (false, true) => Ok(CopyDirection::Upload {
                source: PathBuf::from(source),
                dest: S3Location::parse(destination)?,
            }),
            (false, false) => Err(CseError::config("You must specify at least one s3 location")),
            (true, true) => Err(CseError::config(
                "Copying between two s3 locations is not supported",
            )),
        }
    }
}

impl CliArgs {
    /// Default log filter directive implied by -v/-q
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Runtime configuration for a transfer client
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Worker pool capacity
    pub workers: usize,
    /// Key id recorded in each object's material description
    pub kms_id: String,
    /// AWS region
    pub region: String,
    /// Custom S3 endpoint
    pub endpoint_url: Option<String>,
    /// Static access key id
    pub access_key: Option<String>,
    /// Static secret access key
    pub secret_key: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            kms_id: String::new(),
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            access_key: None,
            secret_key: None,
        }
    }
}

/// Parse a worker count; unset, non-numeric or zero yields the default
pub fn parse_workers(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_WORKERS)
}

impl TransferConfig {
    /// Defaults with the worker count read from the environment
    pub fn from_env() -> Self {
        Self {
            workers: parse_workers(std::env::var(WORKERS_ENV).ok().as_deref()),
            ..Self::default()
        }
    }

    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        if args.kms_id.trim().is_empty() {
            return Err(CseError::config("KMS key id must not be empty"));
        }
        if args.access_key.is_some() != args.secret_key.is_some() {
            return Err(CseError::config(
                "--access-key and --secret-key must be given together",
            ));
        }

        Ok(Self {
            kms_id: args.kms_id.clone(),
            region: args.region.clone(),
            endpoint_url: args.endpoint_url.clone(),
            access_key: args.access_key.clone(),
            secret_key: args.secret_key.clone(),
            ..Self::from_env()
        })
    }
}
