//! s3csecmd CLI - encrypted bulk copy to and from S3

use clap::Parser;
use s3csecmd::config::{CliArgs, CopyDirection, TransferConfig};
use s3csecmd::crypto::{EnvelopeCipher, KmsKeyWrapper};
use s3csecmd::error::Result;
use s3csecmd::progress::ProgressReporter;
use s3csecmd::storage::{AwsSession, NativeS3Config, NativeS3Store};
use s3csecmd::transfer::TransferClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments; usage errors exit with status 1
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = TransferConfig::from_cli(&args)?;
    let direction = args.command.direction()?;

    let session = AwsSession::connect(&NativeS3Config {
        region: config.region.clone(),
        endpoint_url: config.endpoint_url.clone(),
        force_path_style: config.endpoint_url.is_some(),
        access_key_id: config.access_key.clone(),
        secret_access_key: config.secret_key.clone(),
    })?;

    // Counters run either way; the spinner only draws with --progress
    let progress = Arc::new(if args.progress && !args.quiet {
        ProgressReporter::new()
    } else {
        ProgressReporter::disabled()
    });

    let store = Arc::new(NativeS3Store::new(&session));
    let wrapper = Arc::new(KmsKeyWrapper::new(&session, config.kms_id.clone()));
    let client = TransferClient::new(store, EnvelopeCipher::new(wrapper), config)
        .with_progress(progress.clone());

    let summary = match &direction {
        CopyDirection::Download { source, dest } => client.download_folder(source, dest)?,
        CopyDirection::Upload { source, dest } => client.upload_folder(source, dest)?,
    };

    if !args.quiet {
        summary.print_summary();
        if progress.is_enabled() {
            progress.summary().print();
        }
    }

    Ok(())
}
