use clap::Parser;
use tracing_subscriber::EnvFilter;

use gptchat::{cli::Args, session::run_chat};

fn main() {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run_chat(args).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });
}
