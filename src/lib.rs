use std::sync::Arc;

use cache::CounterStore;
use config::Config;
use routes::candidate::{CandidateRegistry, HistoryReconstructor, VoteRecorder};
use utils::Clock;

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub registry: Arc<CandidateRegistry>,
    pub recorder: Arc<VoteRecorder>,
    pub reconstructor: Arc<HistoryReconstructor>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        let registry = Arc::new(CandidateRegistry::new(config.seed_candidates.clone()));
        Self {
            recorder: Arc::new(VoteRecorder::new(store.clone(), registry.clone(), &config)),
            reconstructor: Arc::new(HistoryReconstructor::new(store, &config)),
            registry,
            clock,
            config,
        }
    }
}
