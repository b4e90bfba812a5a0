//! VoidCat Reasoning Core server.
//!
//! One entry command starts the server: `--stdio` serves MCP over
//! newline-delimited JSON-RPC (the default surface), `--http HOST:PORT`
//! serves the REST gateway, and both can run together. All logging goes
//! to stderr; stdout carries nothing but JSON-RPC.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use voidcat_core::{Corpus, EngineConfig, LlmGateway, OpenAiBackend};
use voidcat_mcp::context::AppContext;
use voidcat_mcp::http::{self, state::AppState};
use voidcat_mcp::protocol::stdio::StdioTransport;
use voidcat_mcp::server::McpServer;

// Exit codes: 0 clean shutdown, 2 bad config, 3 knowledge-load failure,
// 4 LLM not configured, 1 otherwise.
const EXIT_BAD_CONFIG: u8 = 2;
const EXIT_KNOWLEDGE: u8 = 3;
const EXIT_LLM_UNCONFIGURED: u8 = 4;

#[derive(Debug, Parser)]
#[command(name = "voidcat", version, about = "VoidCat reasoning server")]
struct Cli {
    /// Serve MCP over stdio (the default when no surface is selected)
    #[arg(long)]
    stdio: bool,

    /// Serve the HTTP gateway on HOST:PORT
    #[arg(long, value_name = "HOST:PORT")]
    http: Option<String>,

    /// Markdown knowledge base directory
    #[arg(long, value_name = "PATH", env = "VOIDCAT_KNOWLEDGE_DIR", default_value = "knowledge")]
    knowledge_dir: PathBuf,

    /// Default model name
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// Persistence root for tasks.json and memories.json
    #[arg(long, value_name = "PATH", env = "VOIDCAT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Cap on concurrently executing MCP tool calls
    #[arg(long, default_value_t = 8)]
    max_concurrency: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging to stderr only: stdout belongs to JSON-RPC.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("VoidCat Reasoning Core v{} starting", env!("CARGO_PKG_VERSION"));

    // -- Configuration ----------------------------------------------------
    let http_addr: Option<SocketAddr> = match &cli.http {
        Some(raw) => match raw.parse() {
            Ok(addr) => Some(addr),
            Err(e) => {
                error!("invalid --http address '{raw}': {e}");
                return ExitCode::from(EXIT_BAD_CONFIG);
            }
        },
        None => None,
    };

    let Ok(api_key) = std::env::var("LLM_API_KEY") else {
        error!("LLM_API_KEY is not set; the reasoning pipeline cannot run");
        return ExitCode::from(EXIT_LLM_UNCONFIGURED);
    };
    let base_url = std::env::var("LLM_BASE_URL").ok();

    let mut config = EngineConfig::standard();
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }

    // -- Knowledge corpus (rebuilt on every startup) -----------------------
    let corpus = match Corpus::load(&cli.knowledge_dir, &config.knowledge) {
        Ok(corpus) => {
            if corpus.is_empty() {
                info!(dir = %cli.knowledge_dir.display(), "knowledge base is empty; running degraded");
            }
            Arc::new(corpus)
        }
        Err(e) => {
            error!("failed to load knowledge base: {e}");
            return ExitCode::from(EXIT_KNOWLEDGE);
        }
    };

    // -- Engine + stores ---------------------------------------------------
    let backend = Arc::new(OpenAiBackend::new(api_key, base_url));
    let gateway = Arc::new(LlmGateway::new(backend, &config.llm));
    let ctx = match AppContext::initialize(corpus, gateway, config, &cli.data_dir).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("failed to initialize stores: {e}");
            return ExitCode::FAILURE;
        }
    };

    // -- Surfaces ----------------------------------------------------------
    let serve_stdio = cli.stdio || http_addr.is_none();

    if let Some(addr) = http_addr {
        let state = AppState::new(Arc::clone(&ctx), 16);
        if serve_stdio {
            tokio::spawn(async move {
                if let Err(e) = http::serve(state, addr).await {
                    error!("HTTP gateway failed: {e}");
                }
            });
        } else {
            // HTTP-only mode blocks on the gateway.
            return match http::serve(state, addr).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("HTTP gateway failed: {e}");
                    ExitCode::FAILURE
                }
            };
        }
    }

    let server = Arc::new(McpServer::new(ctx));
    let transport = StdioTransport::new(cli.max_concurrency);
    info!("serving MCP on stdio");
    match transport.run(server).await {
        Ok(()) => {
            info!("clean shutdown");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("transport error: {e}");
            ExitCode::FAILURE
        }
    }
}
