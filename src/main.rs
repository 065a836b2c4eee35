use anyhow::Result;
use casedocs::{cli, logger};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    if let Err(e) = logger::init() {
        eprintln!("Failed to initialize logging: {e}");
    }

    cli::main().await
}
