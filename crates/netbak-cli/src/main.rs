mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Logging is initialized per command once the config (and its log dir) is known.
    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("netbak error: {:#}", err);
        std::process::exit(1);
    }
}
