//! Binary entrypoint for the sluice CLI.

#[tokio::main]
async fn main() {
    let code = sluice_cli::run().await;
    std::process::exit(code);
}
