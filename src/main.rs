use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use votecount::{
    AppState,
    cache::{CounterStore, MemoryStore, RedisStore},
    config::Config,
    router::create_router,
    utils::{Clock, SystemClock},
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        bucket_window_secs = config.bucket_window_secs,
        bucket_retention_secs = config.bucket_retention_secs,
        history_buckets = config.history_buckets,
        rate_limit_window_secs = config.rate_limit_window_secs,
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 设置计数存储
    let store: Arc<dyn CounterStore> = if config.redis_url.starts_with("memory://") {
        tracing::warn!("Using in-process memory store, counts are not shared between instances");
        Arc::new(MemoryStore::new(clock.clone()))
    } else {
        Arc::new(
            RedisStore::connect(&config.redis_url, config.store_timeout())
                .await
                .expect("Failed to connect to Redis"),
        )
    };

    // 设置应用状态
    let state = AppState::new(config.clone(), store, clock);
    let app = create_router(state);

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    tracing::info!("Server stopped");
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
