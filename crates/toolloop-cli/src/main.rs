mod chat;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use toolloop_core::tools::BuiltinTool;
use toolloop_core::{
    connect_backends, create_provider, Agent, AgentConfig, SharedLogger, ToolBackend, ToolRegistry, ToolServerKind,
    ToolTransport, TracingLogger,
};

/// Chat with a model that can call tools on a toolloop server
#[derive(Debug, Parser)]
#[command(name = "toolloop", version)]
struct Args {
    /// Config file (default: workspace or user config, else built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ask one question and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Override model.provider
    #[arg(long)]
    provider: Option<String>,

    /// Override model.model
    #[arg(long)]
    model: Option<String>,

    /// Override tool_server.endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Talk MCP instead of JSON-RPC to the tool server
    #[arg(long)]
    mcp: bool,

    /// Advertise the tools the server lists instead of the built-in set
    #[arg(long)]
    discover: bool,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::load(path).with_context(|| format!("failed to load {}", path.display()))?,
            None => {
                let cwd = std::env::current_dir().context("failed to read current directory")?;
                let (config, level) = AgentConfig::discover(&cwd).context("failed to load config")?;
                tracing::debug!(level = ?level.map(|l| l.as_str()), "Config discovered");
                config
            }
        };
        self.apply(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn apply(&self, config: &mut AgentConfig) {
        if let Some(provider) = &self.provider {
            config.model.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.tool_server.endpoint = endpoint.clone();
        }
        if self.mcp {
            config.tool_server.kind = ToolServerKind::Mcp;
        }
        if self.discover {
            config.tools.discover = true;
        }
    }
}

async fn build_agent(config: &AgentConfig, logger: SharedLogger) -> anyhow::Result<Agent> {
    let servers = config.servers();
    let backend = connect_backends(servers, logger.clone()).await.with_context(|| {
        let labels: Vec<&str> = servers.iter().map(|s| s.label()).collect();
        format!("cannot reach tool servers: {}", labels.join(", "))
    })?;

    let filter = config.tools.filter();
    let registry = if config.tools.discover {
        let descriptors = backend.list_tools().await.context("tool discovery failed")?;
        ToolRegistry::from_descriptors(descriptors, &filter)
    } else {
        ToolRegistry::from_descriptors(BuiltinTool::ALL.iter().map(BuiltinTool::descriptor), &filter)
    };
    if registry.is_empty() {
        tracing::warn!("No tools are advertised to the model");
    }
    tracing::info!(tools = ?registry.names().collect::<Vec<_>>(), "Tool registry ready");

    let transport = Arc::new(
        ToolTransport::new(Arc::new(registry), backend, logger.clone())
            .with_default_timeout(config.session.default_tool_timeout()),
    );
    let provider = create_provider(&config.model.provider, logger.clone());

    Ok(Agent::from_config(config, provider, transport, logger))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    let logger: SharedLogger = Arc::new(TracingLogger::new("toolloop::agent"));
    let agent = build_agent(&config, logger).await?;

    match &args.query {
        Some(query) => {
            let outcome = chat::ask(&agent, agent.initial_history(), query).await;
            if let Some(reason) = outcome.abort_reason() {
                anyhow::bail!("session aborted: {}", reason);
            }
            Ok(())
        }
        None => chat::interactive(&agent).await,
    }
}
