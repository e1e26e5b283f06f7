use clap::Parser;
use log::info;
use server::config::{GameConfig, ServerConfig};
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Seconds a player may stay silent during a game
    #[arg(short = 't', long, default_value_t = shared::AFK_TIMEOUT_SECS)]
    afk_timeout: u64,

    /// Maximum number of simultaneous connections
    #[arg(short = 'm', long, default_value = "1024")]
    max_connections: usize,

    /// Largest accepted frame in bytes
    #[arg(long, default_value_t = shared::MAX_FRAME_BYTES)]
    max_frame_bytes: usize,

    /// Seed for spawn positions, for reproducible sessions
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_connections: args.max_connections,
        max_frame_bytes: args.max_frame_bytes,
        game: GameConfig {
            afk_timeout: Duration::from_secs(args.afk_timeout),
            rng_seed: args.seed,
            ..GameConfig::default()
        },
    };

    info!(
        "Starting server (AFK timeout {}s, up to {} connections)",
        args.afk_timeout, args.max_connections
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
