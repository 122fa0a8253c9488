use bookstore::cli::{self as prog_cli, Command};
use bookstore::config::{AppConfig, Overrides};
use bookstore::logger;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookstore", version, about = "Bookstore document store queries", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, ./bookstore.toml or the user config dir is used.")]
    config: Option<PathBuf>,
    #[arg(long, help = "MongoDB connection string. Takes precedence over config/env.")]
    uri: Option<String>,
    #[arg(long, help = "Log level: error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, help = "Use an in-process store instead of MongoDB (seeded automatically)")]
    memory: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Drop all books and insert the sample records")]
    Seed,
    #[command(about = "Run the CRUD, query, aggregation and index demo")]
    Queries {
        #[arg(long, help = "Print one JSON object per section instead of text")]
        json: bool,
    },
    #[command(about = "Seed, then run the query demo")]
    Demo {
        #[arg(long, help = "Print one JSON object per section instead of text")]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let overrides = Overrides { config_path: cli.config, uri: cli.uri, log_level: cli.log_level };
    let cfg = match AppConfig::load(&overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = logger::configure_logging(cfg.logging.level.as_deref(), cfg.logging.dir.as_deref()) {
        eprintln!("warning: logging disabled: {e}");
    }

    let cmd = match cli.command {
        Commands::Seed => Command::Seed,
        Commands::Queries { json } => Command::Queries { json },
        Commands::Demo { json } => Command::Demo { json },
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = prog_cli::run(&cfg, cli.memory, cmd, &mut stdout).await {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
