use std::process;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use easy_rsa::Rsa;

fn main() {
    let rsa = Rsa::parse();
    let default_filter = if rsa.silent { "easy_rsa=warn" } else { "easy_rsa=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("Run args: {:?}", rsa);
    if let Err(e) = rsa.run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
