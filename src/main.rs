//! Brook server entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use brook::config::Config;
use brook::server::Server;

/// Brook - an in-memory stream store speaking a RESP-style protocol
#[derive(Parser, Debug)]
#[command(name = "brook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on (overrides config file)
    port: Option<u16>,

    /// Path to configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config file)
    #[arg(short = 'b', long = "bind", value_name = "ADDR")]
    bind: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<Config, brook::BrookError> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::default(),
        };
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        Ok(config)
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
