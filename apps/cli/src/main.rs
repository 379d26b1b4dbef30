mod commands;
mod session;
mod turns;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use commands::{parse_command, run_command, Command};
use render::RenderConfig;
use session::{AppSession, SessionState};
use turnpath_api::{ApiConfig, ApiSource};
use turnpath_core::{TrajectoryError, TrajectoryProvider};
use turnpath_file::{FileConfig, FileSource};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// Compute every trajectory on the server
    Api,
    /// Read pre-computed records from the dataset files
    File,
}

#[derive(Parser)]
#[command(name = "turnpath")]
#[command(about = "Turn based driving simulator: chain computed trajectories turn by turn")]
struct Cli {
    /// Trajectory service root
    #[arg(long, default_value = "https://www.dvf.ovh")]
    server: String,

    #[arg(long, value_enum, default_value_t = Backend::Api)]
    backend: Backend,

    /// Read the parameter schema from a local file instead of the server
    #[arg(long)]
    schema_file: Option<PathBuf>,

    /// Dataset location for the file backend (overrides the schema's base_url)
    #[arg(long)]
    dataset_base: Option<String>,

    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Run commands from a file instead of stdin
    #[arg(long)]
    script: Option<PathBuf>,

    #[arg(long, default_value_t = 1200.0)]
    width: f64,
    #[arg(long, default_value_t = 800.0)]
    height: f64,
    /// Screen position of the simulation origin
    #[arg(long, default_value_t = 200.0)]
    origin_x: f64,
    #[arg(long, default_value_t = 400.0)]
    origin_y: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout_secs);
    let api = Arc::new(ApiSource::new(ApiConfig { server_url: cli.server.clone(), timeout, ..ApiConfig::default() })?);

    // the backend only decides where trajectories come from
    let provider: Arc<dyn TrajectoryProvider> = match cli.backend {
        Backend::Api => api.clone() as Arc<dyn TrajectoryProvider>,
        Backend::File => Arc::new(FileSource::new(FileConfig {
            base_url_override: cli.dataset_base.clone(),
            timeout,
        })?),
    };
    let render = RenderConfig { width: cli.width, height: cli.height, origin_x: cli.origin_x, origin_y: cli.origin_y };
    let session = AppSession::new(provider, render);

    let schema = match &cli.schema_file {
        Some(path) => iox::load_schema(path).map_err(|e| TrajectoryError::SchemaLoad(format!("{e:#}"))),
        None => api.fetch_schema().await,
    };
    session.schema_loaded(schema);
    if let SessionState::Failed(f) = &session.inner.lock().state {
        anyhow::bail!("{}", f.message);
    }
    println!("Turn #1");

    match &cli.script {
        Some(path) => {
            let f = tokio::fs::File::open(path).await?;
            repl(&session, BufReader::new(f)).await
        }
        None => repl(&session, BufReader::new(tokio::io::stdin())).await,
    }
}

async fn repl<R: AsyncBufRead + Unpin>(session: &Arc<AppSession>, input: R) -> Result<()> {
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if cmd == Command::Quit {
            break;
        }
        match run_command(session, cmd).await {
            Ok(Some(out)) => println!("{out}"),
            Ok(None) => {}
            Err(e) => eprintln!("{e}"),
        }
    }
    session.settle().await;
    Ok(())
}
