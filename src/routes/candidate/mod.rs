mod handler;
mod model;
mod registry;

pub use handler::{OVER_LIMIT_BODY, history, list, vote};
pub use model::{
    HistoryReconstructor, SeriesPoint, VoteHistory, VoteOutcome, VoteRecorder, VoteSnapshot,
    WindowCounts, rebuild_series,
};
pub use registry::CandidateRegistry;
