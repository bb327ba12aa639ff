use clap::Parser;
use log::{error, info};
use server::game::{EngineSettings, GameInstance};
use server::network::Server;
use server::relay;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation tick period in milliseconds
    #[arg(short, long, default_value = "17")]
    tick_ms: u64,

    /// Maximum number of concurrent sockets
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Countdown between the first frame and the periodic ticks, in milliseconds
    #[arg(long, default_value = "2000")]
    start_delay_ms: u64,

    /// Chance per step that a player starts a trail gap
    #[arg(long, default_value = "0.01")]
    gap_chance: f64,

    /// Fixed random seed for spawn points and gaps
    #[arg(long)]
    seed: Option<u64>,
}

/// Parses command-line arguments, then runs the network server and the game
/// instance on separate tasks until either stops or Ctrl+C is pressed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let settings = EngineSettings {
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        start_delay: Duration::from_millis(args.start_delay_ms),
        gap_chance: args.gap_chance,
        seed: args.seed,
        ..Default::default()
    };
    info!(
        "Tick every {:?}, gap chance {}",
        settings.tick_interval, settings.gap_chance
    );

    let (network, simulation) = relay::channel();
    let game = GameInstance::new(simulation, settings);

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, args.max_clients, network).await?;

    let game_handle = tokio::spawn(game.run());
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Network server stopped: {}", e);
        }
    });

    tokio::select! {
        result = server_handle => {
            if let Err(e) = result {
                error!("Network task panicked: {}", e);
            }
        }
        result = game_handle => {
            if let Err(e) = result {
                error!("Game task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
