use clap::Parser;
use fleetdeck::cli::{
    gateway, handle_completions, handle_config_init, load_config, logs, watch, Cli, Commands,
    ConfigCommands, ConnectArgs,
};
use fleetdeck::config::FleetDeckConfig;
use fleetdeck::logging::init_tracing;

/// Load configuration and install the tracing subscriber for a command
/// that talks to the control plane.
fn prepare(connect: &ConnectArgs) -> anyhow::Result<FleetDeckConfig> {
    let config = load_config(connect)?;
    init_tracing(&config.logging).map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Watch(args) => match prepare(&args.connect) {
            Ok(config) => watch::handle_watch(&args, &config).await,
            Err(e) => Err(e),
        },
        Commands::Logs(args) => match prepare(&args.connect) {
            Ok(config) => logs::handle_logs(&args, &config).await,
            Err(e) => Err(e),
        },
        Commands::Gateway(args) => match prepare(&args.connect) {
            Ok(config) => gateway::handle_gateway(&args, &config).await,
            Err(e) => Err(e),
        },
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => {
                handle_config_init(&args).map_err(anyhow::Error::from)
            }
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
