// src/main.rs

use kdeploy::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("kdeploy error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> kdeploy::errors::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
