use axum::{
    Router,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::{AppState, middleware::log_errors, routes};

// 投票相关的路由
pub fn candidate_routes() -> Router<AppState> {
    Router::new()
        .route("/candidates", get(routes::candidate::list))
        .route("/candidates/{id}", post(routes::candidate::vote))
        .route("/history", get(routes::candidate::history))
}

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let router = Router::new().merge(candidate_routes());

    // 配置了静态目录时，未匹配的请求交给静态文件服务
    let router = match state.config.static_dir.as_deref() {
        Some(dir) => {
            tracing::info!("Serving static files from {}", dir);
            router.fallback_service(ServeDir::new(dir))
        }
        None => router,
    };

    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
