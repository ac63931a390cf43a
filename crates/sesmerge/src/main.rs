use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

mod apply;
mod autoroute;
mod config;
mod output;
mod route;

#[derive(Parser)]
#[command(name = "sesmerge")]
#[command(about = "Merge autorouted Specctra sessions into KiCad boards", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a routed .ses session into a .kicad_pcb board
    #[command(alias = "a")]
    Apply(apply::ApplyArgs),

    /// Run the autorouter on a .dsn design and save the session
    Autoroute(autoroute::AutorouteArgs),

    /// Autoroute a .dsn design and merge the result into its board
    #[command(alias = "r")]
    Route(route::RouteArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default level depends on --debug; RUST_LOG still wins.
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    match cli.command {
        Commands::Apply(args) => apply::execute(args),
        Commands::Autoroute(args) => autoroute::execute(args),
        Commands::Route(args) => route::execute(args),
    }
}
