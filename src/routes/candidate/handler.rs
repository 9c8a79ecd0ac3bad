use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{AppState, error::Result, middleware::ClientOrigin};

use super::model::{VoteHistory, VoteOutcome, VoteSnapshot};

/// 限流时返回的响应体
pub const OVER_LIMIT_BODY: &str = "Over limit!";

/// 给候选人投一票，返回新的总票数
#[axum::debug_handler]
pub async fn vote(
    State(state): State<AppState>,
    Path(candidate): Path<String>,
    ClientOrigin(origin): ClientOrigin,
) -> Result<Response> {
    let now = state.clock.now();

    match state.recorder.record_vote(&candidate, &origin, now).await? {
        VoteOutcome::Counted(total) => Ok((StatusCode::OK, total.to_string()).into_response()),
        VoteOutcome::RateLimited { retry_after_secs } => {
            tracing::info!("Rate limited vote for {} from {}", candidate, origin);
            Ok((
                StatusCode::OK,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                OVER_LIMIT_BODY,
            )
                .into_response())
        }
    }
}

/// 所有候选人的总票数和最近的分钟桶
///
/// ```json
/// {
///     "votes": { "Adam": 10 },
///     "visualization": { "Adam:1483200000": 3, "Adam:1483200060": 7 }
/// }
/// ```
///
/// 没有投票的候选人或空的分钟桶为 null。
#[axum::debug_handler]
pub async fn list(State(state): State<AppState>) -> Result<Json<VoteSnapshot>> {
    let candidates = state.registry.list();
    let snapshot = state
        .reconstructor
        .snapshot(&candidates, state.clock.now())
        .await?;
    Ok(Json(snapshot))
}

/// 重建后的累计票数历史
#[axum::debug_handler]
pub async fn history(State(state): State<AppState>) -> Result<Json<VoteHistory>> {
    let candidates = state.registry.list();
    let history = state
        .reconstructor
        .reconstruct(&candidates, state.clock.now())
        .await?;
    Ok(Json(history))
}
