use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Room code to join
    #[arg(short = 'r', long, default_value = "lobby")]
    room: String,

    /// Display name
    #[arg(short = 'n', long)]
    name: String,

    /// Avatar reference (URL or data URL)
    #[arg(short = 'a', long, default_value = "")]
    avatar: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    println!("Commands: /start /word <text> /end /move <x> <y> /players /quit");

    let mut client = Client::connect(&args.server, args.room, args.name, args.avatar).await?;
    client.run().await?;

    Ok(())
}
