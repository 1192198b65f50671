//! `grainsim` — Monte-Carlo grain-growth simulator entry point.

use clap::Parser;

use grain_potts::config::Config;
use grain_potts::driver;

/// Potts-model grain-growth simulator (n-fold way).
#[derive(Parser, Debug)]
#[command(name = "grainsim")]
#[command(about = "Run a Potts-model grain-growth simulation from a config file")]
struct Args {
    /// Path to the key = value configuration file
    #[arg(long, default_value = "grainsim_config.txt")]
    config: String,

    /// Log filter directive
    #[arg(long, default_value = "grain_potts=info")]
    log: String,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(args.log.as_str())
        .init();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("grainsim: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = driver::run(&config) {
        eprintln!("grainsim: {err}");
        std::process::exit(1);
    }
}
