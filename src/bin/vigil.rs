//! Vigil CLI binary.
//!
//! Content security analysis for AI governance.
//!
//! # Commands
//!
//! - `analyze` - Analyze prompt text for injection and PII
//! - `scan` - Scan a file for sensitive content and malware
//! - `server` - Start the HTTP analysis server

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use vigil::{
    assess::RiskEngine,
    config::Config,
    patterns::NullPatternStore,
    server::{create_router, AppState, ServerConfig},
    VERSION,
};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version = VERSION)]
#[command(about = "Vigil - content security analysis for AI governance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze prompt text for injection and PII
    Analyze {
        /// Text input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Scan a file upload for sensitive content and malware
    Scan {
        /// File to scan
        path: PathBuf,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Start the HTTP analysis server
    Server {
        /// Listen port
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Listen host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind to all interfaces
        #[arg(long)]
        bind_all: bool,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Disable CORS
        #[arg(long)]
        no_cors: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            file,
            config,
            json,
            verbose,
        } => cmd_analyze(input, file, config, json, verbose),

        Commands::Scan {
            path,
            config,
            json,
            verbose,
        } => cmd_scan(path, config, json, verbose),

        Commands::Server {
            port,
            host,
            bind_all,
            config,
            no_cors,
            verbose,
        } => cmd_server(port, host, bind_all, config, no_cors, verbose),
    }
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_env().merge(Config::from_file(path)?),
        None => Config::from_env(),
    };
    Ok(config)
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        return Ok(std::fs::read_to_string(path)?);
    }

    match input.as_deref() {
        Some("-") | None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
        Some(text) => Ok(text.to_string()),
    }
}

fn cmd_analyze(
    input: Option<String>,
    file: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    init_logging(verbose);

    let text = read_input(input, file)?;
    let config = load_config(config)?;
    let engine = RiskEngine::from_config(&config, Box::new(NullPatternStore));

    let runtime = tokio::runtime::Runtime::new()?;
    let assessment = runtime.block_on(engine.assess_prompt(&text));

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "shouldBlock": assessment.should_block,
                "riskLevel": assessment.risk_level,
                "threats": assessment.threats,
                "quickPattern": assessment.quick_pattern,
                "dangerousPattern": assessment.dangerous_pattern,
                "blockReason": assessment.block_reason,
                "piiDetection": assessment.pii,
                "summary": assessment.summary,
            }))?
        );
    } else {
        println!("Risk level:   {}", assessment.risk_level);
        println!("Should block: {}", assessment.should_block);
        if let Some(reason) = &assessment.block_reason {
            println!("Reason:       {reason}");
        }
        for threat in &assessment.threats {
            println!("  - {threat}");
        }
        println!("{}", assessment.summary);
    }

    if assessment.should_block {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_scan(
    path: PathBuf,
    config: Option<PathBuf>,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    init_logging(verbose);

    let bytes = std::fs::read(&path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());

    let config = load_config(config)?;
    let engine = RiskEngine::from_config(&config, Box::new(NullPatternStore));

    let runtime = tokio::runtime::Runtime::new()?;
    let assessment = runtime.block_on(engine.assess_file(&bytes, &filename, None, None));

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "shouldBlock": assessment.should_block,
                "riskLevel": assessment.risk_level,
                "isMalicious": assessment.is_malicious,
                "isSensitiveFile": assessment.is_sensitive_file,
                "isMaliciousFile": assessment.is_malicious_file,
                "threats": assessment.threats,
                "blockReason": assessment.block_reason,
                "piiDetection": assessment.pii,
                "fileHash": assessment.file_hash,
                "fileSize": assessment.file_size,
                "summary": assessment.summary,
            }))?
        );
    } else {
        println!("File:         {} ({} bytes)", filename, assessment.file_size);
        println!("Hash:         {}", assessment.file_hash);
        println!("Risk level:   {}", assessment.risk_level);
        println!("Should block: {}", assessment.should_block);
        if let Some(reason) = &assessment.block_reason {
            println!("Reason:       {reason}");
        }
        for threat in &assessment.threats {
            println!("  - {threat}");
        }
        println!("{}", assessment.summary);
    }

    if assessment.should_block {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_server(
    port: u16,
    host: String,
    bind_all: bool,
    config_path: Option<PathBuf>,
    no_cors: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    init_logging(verbose);

    let config = load_config(config_path)?;

    let mut server_config = ServerConfig::default().with_port(port);
    if bind_all {
        server_config = server_config.bind_all();
    } else {
        let addr: std::net::SocketAddr = format!("{host}:{port}").parse()?;
        server_config = server_config.with_addr(addr);
    }
    if no_cors {
        server_config = server_config.without_cors();
    }

    let engine = RiskEngine::from_config(&config, Box::new(NullPatternStore));
    let state = Arc::new(AppState::new(server_config.clone(), engine));
    let app = create_router(state);

    tracing::info!("Starting Vigil analysis server on {}", server_config.addr);
    tracing::info!(
        "Semantic detector: {}",
        if config.semantic.api_key.is_some() {
            "configured"
        } else {
            "not configured (fallback policy applies)"
        }
    );
    tracing::info!(
        "Malware scanning: {}",
        if config.malware.api_key.is_some() {
            "configured"
        } else {
            "not configured"
        }
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(server_config.addr).await?;
        axum::serve(listener, app).await?;
        Ok::<_, anyhow::Error>(())
    })
}
