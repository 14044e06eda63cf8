use clap::Parser;
use clap::error::ErrorKind;

use palin_dispatch::worker::{EXIT_FAILURE, EXIT_SUCCESS};
use palin_dispatch::{Cli, Output};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help is a request that was not served, so it fails like a usage error
            let code = match e.kind() {
                ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_FAILURE,
            };
            std::process::exit(code);
        }
    };

    let quiet = cli.quiet;
    let code = match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            Output::new(false, quiet).error(&format!("{e:#}"));
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
