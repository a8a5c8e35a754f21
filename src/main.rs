//! dashcache - durable client state and offline asset cache for the dashboard shell

use clap::{CommandFactory, Parser};

mod cli;
mod config;
mod error;
mod models;
mod output;
mod proxy;
mod state;

use cli::args::GlobalOptions;
use cli::{CacheCommands, Cli, Commands, StateCommands};
use error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);
    log::debug!("Options: {:?}", opts);

    match cli.command {
        Commands::Init { force } => cli::init::run(&opts, force),
        Commands::Status => cli::status::run(&opts),
        Commands::Version => {
            println!("dashcache version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Install => cli::proxy::install(&opts).await,
        Commands::Activate => cli::proxy::activate(&opts),
        Commands::Fetch {
            url,
            method,
            navigate,
            body,
        } => cli::proxy::fetch(&opts, &url, &method, navigate, body).await,
        Commands::Cache(cmd) => match cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear => cli::cache::clear(&opts),
            CacheCommands::Generations => cli::cache::generations(&opts),
            CacheCommands::Entries { generation } => {
                cli::cache::entries(&opts, generation.as_deref())
            }
            CacheCommands::Path => cli::cache::path(&opts),
        },
        Commands::State(cmd) => match cmd {
            StateCommands::Get { key, default } => cli::state::get(&opts, &key, &default),
            StateCommands::Set { key, value } => cli::state::set(&opts, &key, &value),
            StateCommands::List => cli::state::list(&opts),
            StateCommands::Remove { key } => cli::state::remove(&opts, &key),
        },
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "dashcache", &mut std::io::stdout());
            Ok(())
        }
    }
}
