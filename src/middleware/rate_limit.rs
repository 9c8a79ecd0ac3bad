use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::{
    AppState,
    cache::{CounterStore, keys::rate_limit_key},
    config::Config,
    error::StoreError,
    utils::window_start,
};

/// 限流判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Limited { retry_after_secs: u64 },
}

/// 每个 (来源, 候选人) 在固定窗口内最多投 `max_votes` 票
///
/// 状态完全由存储里的限流键表示: 键不存在即放行，键存在且达到上限即拒绝，
/// 窗口过期后键自动消失。
///
/// 先读再自增是两次往返，并发请求可能同时看到"未达上限"，
/// 同一窗口内会多放行几票。这个误差受窗口长度限制，按近似限流处理。
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    window_secs: u64,
    max_votes: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &Config) -> Self {
        Self {
            store,
            window_secs: config.rate_limit_window().as_secs(),
            max_votes: config.rate_limit_votes,
        }
    }

    pub async fn admit(
        &self,
        origin: &str,
        candidate: &str,
        now: i64,
    ) -> Result<Admission, StoreError> {
        let window = window_start(now, self.window_secs);
        let key = rate_limit_key(origin, window, candidate);

        let current = self.store.get(&key).await?.unwrap_or(0);
        if current >= self.max_votes as i64 {
            let retry_after_secs = (window + self.window_secs as i64 - now).max(1) as u64;
            tracing::debug!(key = %key, current, "Vote rate limited");
            return Ok(Admission::Limited { retry_after_secs });
        }

        self.store.incr_with_expiry(&key, self.window_secs).await?;
        Ok(Admission::Admitted)
    }
}

/// 投票来源地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOrigin(pub String);

impl FromRequestParts<AppState> for ClientOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());
        Ok(ClientOrigin(resolve_origin(
            &parts.headers,
            peer.as_deref(),
            state.config.trust_proxy_headers,
        )))
    }
}

/// 只有在信任反向代理时才读取 x-real-ip / x-forwarded-for，否则用连接地址
pub fn resolve_origin(headers: &HeaderMap, peer: Option<&str>, trust_proxy: bool) -> String {
    let forwarded = if trust_proxy {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .filter(|ip| !ip.trim().is_empty())
            .or_else(|| {
                headers
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
    } else {
        None
    };

    forwarded
        .or(peer)
        .unwrap_or("unknown")
        .trim()
        .to_string()
}
