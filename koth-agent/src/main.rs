//! KotH Agent
//!
//! Reports who owns this host and whether its service is healthy.

use clap::Parser;
use koth_agent::{AgentServerBuilder, VERSION};
use koth_core::{init_logging, AgentSettings, LogFormat, LoggingConfig};
use std::path::PathBuf;
use tracing::{error, info};

/// KotH Agent - ownership and health endpoints for King of the Hill scoring
#[derive(Parser, Debug)]
#[command(name = "koth-agent")]
#[command(about = "Ownership and health endpoints for King of the Hill scoring")]
#[command(disable_version_flag = true)]
struct Args {
    /// Address to bind to
    #[arg(long, env = "KOTH_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "KOTH_PORT")]
    port: Option<u16>,

    /// File containing the current owner
    #[arg(long, env = "KOTH_FILE")]
    file: Option<PathBuf>,

    /// Command whose success means the service is healthy
    #[arg(long, env = "KOTH_HEALTH_CMD")]
    health_cmd: Option<String>,

    /// Command that prints the current owner; overrides --file
    #[arg(long, env = "KOTH_OWNER_CMD")]
    owner_cmd: Option<String>,

    /// Comma-separated CIDR ranges allowed to call the agent
    #[arg(long, env = "KOTH_ORIGIN")]
    origin: Option<String>,

    /// Shared secret expected in the Authorization header
    #[arg(long, env = "KOTH_APIKEY", hide_env_values = true)]
    apikey: Option<String>,

    /// TLS private key file
    #[arg(long, env = "KOTH_KEYFILE")]
    keyfile: Option<String>,

    /// TLS certificate file
    #[arg(long, env = "KOTH_CERTFILE")]
    certfile: Option<String>,

    /// TLS private key as a PEM string
    #[arg(long, env = "KOTH_KEYSTRING", hide_env_values = true)]
    keystring: Option<String>,

    /// TLS certificate as a PEM string
    #[arg(long, env = "KOTH_CERTSTRING")]
    certstring: Option<String>,

    /// Kill commands that run longer than this many seconds
    #[arg(long, env = "KOTH_COMMAND_TIMEOUT")]
    command_timeout: Option<u64>,

    /// TOML file with default settings
    #[arg(long, env = "KOTH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "KOTH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format (pretty, compact, json)
    #[arg(long, env = "KOTH_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Append logs to this file instead of stdout
    #[arg(long, env = "KOTH_LOG_FILE")]
    log_file: Option<String>,

    /// Print version
    #[arg(long)]
    version: bool,
}

impl Args {
    /// Layer flags and environment over file settings
    fn apply(self, mut settings: AgentSettings) -> AgentSettings {
        if let Some(host) = self.host {
            settings.host = host;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(file) = self.file {
            settings.file = file;
        }
        if let Some(health_cmd) = self.health_cmd {
            settings.health_cmd = health_cmd;
        }
        if let Some(owner_cmd) = self.owner_cmd {
            settings.owner_cmd = owner_cmd;
        }
        if let Some(origin) = self.origin {
            settings.origin = origin;
        }
        if let Some(apikey) = self.apikey {
            settings.apikey = apikey;
        }
        if let Some(keyfile) = self.keyfile {
            settings.keyfile = keyfile;
        }
        if let Some(certfile) = self.certfile {
            settings.certfile = certfile;
        }
        if let Some(keystring) = self.keystring {
            settings.keystring = keystring;
        }
        if let Some(certstring) = self.certstring {
            settings.certstring = certstring;
        }
        if self.command_timeout.is_some() {
            settings.command_timeout_secs = self.command_timeout;
        }
        settings
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if args.version {
        println!("{}", VERSION);
        return;
    }

    let mut logging = LoggingConfig::default()
        .with_level(args.log_level.clone())
        .with_format(args.log_format);
    if let Some(path) = &args.log_file {
        logging = logging.with_log_file(path.clone());
    }
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = AgentSettings::load(args.config.as_deref())?;
    let settings = args.apply(settings);

    info!("Starting KotH agent {}", VERSION);
    let server = AgentServerBuilder::new().settings(settings).build()?;
    server.start().await?;

    info!("Agent stopped");
    Ok(())
}
