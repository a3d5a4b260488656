//! Courier CLI binary entry point.

use std::sync::Arc;

use courier::agent::Agent;
use courier::cli::{AddressArgs, Cli, Commands, QueryArgs, RunArgs};
use courier::config::AgentSettings;
use courier::transport::{spawn_line_reader, StdioTransport};
use courier::types::AgentAddress;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const INBOUND_CAPACITY: usize = 64;

#[tokio::main]
async fn main() {
    // stdout carries envelopes, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse_args();

    let result = match cli.command {
        Commands::Run(args) => handle_run(args).await,
        Commands::Query(args) => handle_query(args).await,
        Commands::Address(args) => handle_address(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_run(args: RunArgs) -> courier::Result<()> {
    let mut settings = AgentSettings::load(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        settings.mode = mode;
        settings.validate()?;
    }

    let agent = Agent::from_settings(settings, Arc::new(StdioTransport::stdout()))?;
    tracing::info!(address = %agent.address(), "starting agent");

    let shutdown = agent.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    if !args.no_rest {
        let rest_agent = agent.clone();
        let bind = agent.settings().rest_bind.clone();
        tokio::spawn(async move {
            if let Err(e) = courier::rest::serve(rest_agent, &bind).await {
                tracing::error!(error = %e, "REST endpoint stopped");
            }
        });
    }

    let (inbound, reader) = spawn_line_reader(tokio::io::stdin(), INBOUND_CAPACITY);
    let result = agent.run(inbound).await;
    reader.abort();
    agent.shutdown_token().cancel();
    result
}

async fn handle_query(args: QueryArgs) -> courier::Result<()> {
    let settings = AgentSettings::load(args.config.as_deref())?;
    let agent = Agent::from_settings(settings, Arc::new(StdioTransport::stdout()))?;
    println!("{}", agent.query(&args.text).await);
    Ok(())
}

fn handle_address(args: AddressArgs) -> courier::Result<()> {
    let address = match args.seed {
        Some(seed) => AgentAddress::from_seed(&seed),
        None => AgentSettings::load(None)?.address(),
    };
    println!("{address}");
    Ok(())
}
