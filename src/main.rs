use anyhow::Context;
use clap::Parser;
use meshbus::broker::{self, BrokerState};
use meshbus::config::Config;
use meshbus::identity::PeerId;
use meshbus::peers;
use meshbus::store::TopicStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = Config::parse();
    let self_id = PeerId::new(config.host.clone(), config.port);

    let peer_list = peers::load_peers(&config.peers, &self_id);
    log::info!("[main] loaded {} peer(s) from {}", peer_list.len(), config.peers);

    let db_path = config.db_path();
    let store = TopicStore::open(&db_path)
        .await
        .with_context(|| format!("failed to open topic store at {db_path}"))?;

    let state = Arc::new(BrokerState::new(self_id, peer_list, store));

    tokio::spawn(broker::initiate_election(Arc::clone(&state)));

    broker::run_listener(state)
        .await
        .context("broker listener failed")?;

    Ok(())
}
