use clap::Parser;
use redline_bin::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _log_guard = match redline_log::init() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {e}");
            None
        },
    };

    if let Err(e) = redline_bin::run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
