use clap::Parser;
use env_logger::Builder;
use eyre::{eyre, Result};
use log::{debug, error};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

mod event;
mod event_filter;
mod forwarder;
mod image_filter;
mod outcome;
mod settings;

use event_filter::EventFilter;
use forwarder::{Forwarder, LambdaInvoker};
use settings::{load_config, FileConfig, Settings, FILTERS_ENV, LAMBDA_ARN_ENV};

#[derive(Parser, Debug)]
#[command(
    name = "ecr-event-filter",
    version,
    about = "Forward ECR image push events that match SOCI repository image tag filters",
    long_about = None
)]
struct Cli {
    /// Event JSON file; read from stdin when omitted
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Optional YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma separated globs over <repository>:<tag>
    #[arg(short, long, env = FILTERS_ENV)]
    filters: Option<String>,

    /// Function the matching events are forwarded to
    #[arg(short = 'a', long, env = LAMBDA_ARN_ENV)]
    lambda_arn: Option<String>,

    /// Lambda endpoint override, e.g. a local emulator
    #[arg(long, env = "LAMBDA_ENDPOINT_URL")]
    endpoint_url: Option<String>,
}

fn setup_logging() {
    Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}

fn read_event(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            error!("Failed to read event file {}: {}", path.display(), e);
            eyre!("Failed to read event file {}: {}", path.display(), e)
        }),
        None => {
            let mut payload = String::new();
            io::stdin()
                .read_to_string(&mut payload)
                .map_err(|e| eyre!("Failed to read event from stdin: {}", e))?;
            Ok(payload)
        }
    }
}

fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    debug!("Parsed CLI arguments: {:?}", cli);

    let mut file_config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let endpoint_url = cli.endpoint_url.or(file_config.endpoint_url.take());
    let invoker = LambdaInvoker::new(endpoint_url.as_deref())
        .map_err(|e| eyre!("Failed to build Lambda client: {}", e))?;
    let settings = Settings::merge(cli.filters, cli.lambda_arn, file_config);
    let event_filter = EventFilter::new(settings, Forwarder::new(Box::new(invoker)));

    let payload = read_event(cli.event.as_deref())?;
    let outcome = event_filter.handle_payload(&payload);

    println!("{}", serde_json::to_string(&outcome)?);
    debug!(
        "Event filter finished with status {} (success: {})",
        outcome.status_code,
        outcome.is_success()
    );
    Ok(())
}
