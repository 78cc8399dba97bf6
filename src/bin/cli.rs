//! WatchKV CLI Client
//!
//! Command-line interface for interacting with WatchKV.

use clap::{Parser, Subcommand};
use watchkv::client::Client;
use watchkv::Result;

/// WatchKV CLI
#[derive(Parser, Debug)]
#[command(name = "watchkv-cli")]
#[command(about = "CLI for the WatchKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:50051")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a record by name
    Get {
        /// The name to get
        #[arg(long)]
        name: String,
    },

    /// Create a record that does not exist yet
    Create {
        /// The name to create
        #[arg(long)]
        name: String,

        /// The value with which to create
        #[arg(long)]
        value: String,
    },

    /// Update an existing record
    Update {
        /// The name to update
        #[arg(long)]
        name: String,

        /// The new value
        #[arg(long)]
        value: String,
    },

    /// Print every new value of a record
    Watch {
        /// The name to watch
        #[arg(long)]
        name: String,

        /// Stop after this many values (negative watches forever)
        #[arg(short, long, default_value = "-1", allow_hyphen_values = true)]
        count: i64,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Get { name } => println!("{}", client.get(&name)?),
        Commands::Create { name, value } => println!("{}", client.create(&name, &value)?),
        Commands::Update { name, value } => println!("{}", client.update(&name, &value)?),
        Commands::Watch { name, count } => {
            let limit = usize::try_from(count).ok();
            for record in client.watch(&name, limit)? {
                println!("{}", record?);
            }
        }
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
    }

    Ok(())
}
