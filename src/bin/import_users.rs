use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use import_server::import::{ImportConfig, ImportError, ImportOverrides, ImportService, RunContext};
use import_server::users::UserDirectory;

#[derive(Parser, Debug)]
#[command(
    name = "import_users",
    about = "Import users from a CSV file into an in-memory directory and print the summary"
)]
struct Args {
    /// CSV file with a `username,email,password,role` header.
    #[arg(long)]
    file: PathBuf,

    /// Number of concurrent workers (1-20).
    #[arg(long)]
    workers: Option<usize>,

    /// Record queue capacity (1-1000).
    #[arg(long)]
    batch_size: Option<usize>,

    /// Maximum records to accept (1-10000).
    #[arg(long)]
    max_records: Option<usize>,

    /// Overall timeout in seconds (1-300).
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Send repeated emails/usernames to the directory instead of skipping them.
    #[arg(long)]
    allow_duplicates: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let overrides = ImportOverrides {
        worker_count: args.workers,
        batch_size: args.batch_size,
        max_records: args.max_records,
        timeout_seconds: args.timeout_secs,
        skip_duplicates: args.allow_duplicates.then_some(false),
    };
    let config = ImportConfig::from_env().with_overrides(&overrides);

    let contents = tokio::fs::read(&args.file).await.map_err(|err| {
        io::Error::new(err.kind(), format!("cannot read {}: {err}", args.file.display()))
    })?;

    let directory = UserDirectory::new()
        .map_err(|err| io::Error::other(format!("argon2 init failed: {err}")))?;
    let service = ImportService::new(Arc::new(directory));

    let summary = match service
        .import_users(contents.as_slice(), &config, &RunContext::background())
        .await
    {
        Ok(summary) => summary,
        Err(ImportError::Interrupted { summary, .. }) => {
            writeln!(io::stderr(), "warning: import timed out, summary is partial")?;
            *summary
        }
        Err(err) => {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(1);
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.has_failures() {
        std::process::exit(2);
    }
    Ok(())
}
