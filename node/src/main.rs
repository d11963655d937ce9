use std::env;

use anyhow::Result;
use log::info;

use node::{config::NodeConfig, simulation};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = NodeConfig::load(env::args().nth(1))?;
    info!("loaded config {config:?}");

    let report = simulation::evaluate(&config).await?;
    info!("aggregated outputs {:?}", report.outputs);
    info!("finalized metrics {:?}", report.metrics);

    Ok(())
}
