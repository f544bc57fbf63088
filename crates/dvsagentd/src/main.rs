//! dvsagentd daemon entry point.
//!
//! Parses arguments, validates the switch mapping table, wires the
//! reconciliation components and runs the polling loop until terminated.
//! Without a switch SDK integration the daemon runs against the
//! simulation backend; event dispatch is pending transport integration.

use clap::Parser;
use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use dvs_agent_common::{
    parse_network_maps, AgentConfig, AgentResult, RetryPolicy, SwitchHandle,
};
use dvs_agentd::{
    AgentState, DvsAgent, Heartbeat, LoggingReporter, PollingLoop, SimPollSource, SimSwitch,
    SwitchRegistry,
};

/// Distributed virtual switch reconciliation agent
#[derive(Parser, Debug)]
#[command(name = "dvsagentd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hostname reported to the control plane
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Physical network mapping, `<physical_network>:<switch>` (repeatable)
    #[arg(long = "network-map", value_name = "PHYSNET:SWITCH")]
    network_maps: Vec<String>,

    /// Seconds between polling iterations
    #[arg(long, default_value = "2")]
    polling_interval: u64,

    /// Seconds between heartbeat state reports
    #[arg(long, default_value = "30")]
    report_interval: u64,

    /// Retry bound for transient switch failures
    #[arg(long, default_value = "10")]
    api_retry_count: u32,

    /// Milliseconds between retry attempts
    #[arg(long, default_value = "1000")]
    retry_delay_ms: u64,

    /// Log every successful heartbeat at info level
    #[arg(long)]
    log_agent_heartbeats: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> AgentConfig {
        AgentConfig {
            host: self.host,
            network_maps: self.network_maps,
            polling_interval_secs: self.polling_interval,
            report_interval_secs: self.report_interval,
            api_retry_count: self.api_retry_count,
            retry_delay_ms: self.retry_delay_ms,
            log_agent_heartbeats: self.log_agent_heartbeats,
        }
    }
}

/// Initializes tracing/logging.
fn init_logging(level: &str) {
    let level = level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Builds the switch registry from the validated mapping table.
///
/// Physical networks sharing a switch name share one handle.
fn build_registry(network_map: &HashMap<String, String>) -> SwitchRegistry {
    let mut handles: HashMap<String, Arc<SimSwitch>> = HashMap::new();
    let switches = network_map
        .iter()
        .map(|(physnet, switch_name)| {
            let handle = handles
                .entry(switch_name.clone())
                .or_insert_with(|| Arc::new(SimSwitch::new(switch_name.clone())));
            (
                physnet.clone(),
                Arc::clone(handle) as Arc<dyn SwitchHandle>,
            )
        })
        .collect();
    SwitchRegistry::new(switches)
}

async fn run_daemon(config: AgentConfig) -> AgentResult<()> {
    let network_map = parse_network_maps(&config.network_maps)?;
    let registry = build_registry(&network_map);
    for (physnet, switch) in registry.mappings() {
        info!(physical_network = physnet, switch, "mapped physical network");
    }

    let retry = RetryPolicy::new(config.api_retry_count, config.retry_delay());
    let agent = DvsAgent::new(registry, retry);
    info!(
        mapped_networks = agent.registry().len(),
        "reconciliation callbacks ready; event dispatch pending transport integration"
    );

    let mut poll_loop = PollingLoop::new(config.polling_interval());
    let shutdown = poll_loop.shutdown_handle();

    let heartbeat = Heartbeat::new(
        Arc::new(LoggingReporter),
        AgentState::new(&config),
        poll_loop.full_sync_flag(),
        config.report_interval(),
        config.log_agent_heartbeats,
    );
    let heartbeat_handle = heartbeat.spawn();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("caught termination signal, quitting daemon loop");
            shutdown.request_shutdown();
        }
    });

    info!("agent initialized successfully, now running");
    let mut source = SimPollSource::new();
    poll_loop.run(&mut source).await;

    heartbeat_handle.abort();
    info!(
        full_syncs = source.full_sync_requests(),
        "graceful shutdown complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting dvsagentd ---");
    let config = args.into_config();

    match run_daemon(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "agent terminated");
            ExitCode::FAILURE
        }
    }
}
