use callcache::cli::{self as prog_cli, Command};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "callcache", version, about = "Inspect call-cache declarations and overflow storage", long_about = None)]
struct Cli {
    #[arg(long, help = "Log level for this run (error|warn|info|debug|trace). Logs go to CALLCACHE_LOG_DIR or the current directory.")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Parse a TOML declaration file and print the resolved cache configurations")]
    Validate {
        #[arg(help = "Path to the declaration file")]
        file: PathBuf,
        #[arg(long, help = "Print as JSON")]
        json: bool,
    },
    #[command(about = "List overflow records kept for a cache")]
    Inspect {
        #[arg(help = "Overflow root directory")]
        root: PathBuf,
        #[arg(help = "Cache name")]
        cache: String,
    },
    #[command(about = "Remove expired overflow records of a cache")]
    Purge {
        #[arg(help = "Overflow root directory")]
        root: PathBuf,
        #[arg(help = "Cache name")]
        cache: String,
        #[arg(long, help = "Declaration file supplying the cache's expiry settings")]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Some(level) = cli.log_level.as_deref() {
        let dir = std::env::var("CALLCACHE_LOG_DIR").ok().map(PathBuf::from);
        if let Err(e) = callcache::logger::configure_logging(dir.as_deref(), Some(level), None) {
            eprintln!("warning: logging not configured: {e}");
        }
    }
    let cmd = match cli.command {
        Commands::Validate { file, json } => Command::Validate { file, json },
        Commands::Inspect { root, cache } => Command::Inspect { root, cache },
        Commands::Purge { root, cache, config } => Command::Purge { root, cache, declarations: config },
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = prog_cli::run(cmd, &mut stdout) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
