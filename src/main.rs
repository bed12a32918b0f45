use clap::Parser;
use tma_notes::cli::{handle_bot, handle_serve, handle_verify, Cli, Commands};
use tma_notes::logging;

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args),
        Commands::Bot(args) => handle_bot(args),
        Commands::Verify(args) => handle_verify(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
