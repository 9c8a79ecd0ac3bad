use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;
use votecount::{
    AppState,
    cache::{CounterStore, MemoryStore},
    config::Config,
    error::StoreError,
    router::create_router,
    routes::candidate::OVER_LIMIT_BODY,
    utils::ManualClock,
};

fn app_at(now: i64, config: Config) -> (Arc<ManualClock>, Router) {
    let clock = Arc::new(ManualClock::new(now));
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let state = AppState::new(config, store, clock.clone());
    (clock, create_router(state))
}

fn vote_request(candidate: &str, peer: &str) -> Request<Body> {
    let addr: SocketAddr = format!("{}:40000", peer).parse().expect("socket addr");
    Request::builder()
        .method("POST")
        .uri(format!("/candidates/{}", candidate))
        .extension(ConnectInfo(addr))
        .body(Body::empty())
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_string(response).await).expect("json body")
}

#[tokio::test]
async fn vote_returns_new_total_as_text() {
    let (_, app) = app_at(0, Config::default());

    let response = app
        .clone()
        .oneshot(vote_request("Adam", "10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "1");

    let response = app
        .oneshot(vote_request("Adam", "10.0.0.2"))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "2");
}

#[tokio::test]
async fn repeated_vote_is_rate_limited_then_reopens() {
    let (clock, app) = app_at(0, Config::default());

    let response = app
        .clone()
        .oneshot(vote_request("Adam", "10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "1");

    clock.set(2);
    let response = app
        .clone()
        .oneshot(vote_request("Adam", "10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok()),
        Some("3")
    );
    assert_eq!(body_string(response).await, OVER_LIMIT_BODY);

    let response = app
        .clone()
        .oneshot(get_request("/candidates"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["votes"]["Adam"], 1);

    clock.set(6);
    let response = app
        .oneshot(vote_request("Adam", "10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "2");
}

#[tokio::test]
async fn candidates_scenario_across_minutes() {
    let (clock, app) = app_at(0, Config::default());

    app.clone()
        .oneshot(vote_request("Adam", "10.0.0.1"))
        .await
        .unwrap();

    let json = body_json(
        app.clone()
            .oneshot(get_request("/candidates"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["votes"]["Adam"], 1);
    assert_eq!(json["visualization"]["Adam:0"], 1);
    assert_eq!(json["visualization"]["Adam:-60"], Value::Null);

    clock.set(70);
    for peer in ["10.0.0.1", "10.0.0.2"] {
        app.clone().oneshot(vote_request("Adam", peer)).await.unwrap();
    }

    let json = body_json(
        app.clone()
            .oneshot(get_request("/candidates"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["votes"]["Adam"], 3);
    assert_eq!(json["visualization"]["Adam:60"], 2);

    let json = body_json(app.oneshot(get_request("/history")).await.unwrap()).await;
    assert_eq!(json["totals"]["Adam"], 3);
    let series = json["series"]["Adam"].as_array().expect("series array");
    assert_eq!(series.len(), 10);
    assert_eq!(series[9]["timestamp"], 60);
    assert_eq!(series[9]["count"], 3);
    assert_eq!(series[9]["time"], "00:01");
    assert_eq!(series[8]["timestamp"], 0);
    assert_eq!(series[8]["count"], 1);
}

#[tokio::test]
async fn non_ascii_candidate_round_trips() {
    let (_, app) = app_at(0, Config::default());

    // "薯片" 经过 URL 编码
    let response = app
        .clone()
        .oneshot(vote_request("%E8%96%AF%E7%89%87", "10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "1");

    let json = body_json(app.oneshot(get_request("/candidates")).await.unwrap()).await;
    assert_eq!(json["votes"]["薯片"], 1);
    assert_eq!(json["visualization"]["薯片:0"], 1);
}

#[tokio::test]
async fn seeded_candidates_show_null_before_first_vote() {
    let config = Config {
        seed_candidates: vec!["林林".to_string(), "正氣".to_string()],
        ..Config::default()
    };
    let (_, app) = app_at(125, config);

    let json = body_json(
        app.clone()
            .oneshot(get_request("/candidates"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["votes"]["林林"], Value::Null);
    assert_eq!(json["visualization"].as_object().unwrap().len(), 20);

    let json = body_json(app.oneshot(get_request("/history")).await.unwrap()).await;
    assert_eq!(json["totals"]["正氣"], 0);
    let counts: Vec<u64> = json["series"]["正氣"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["count"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, vec![0; 10]);
}

#[tokio::test]
async fn missing_connect_info_uses_unknown_origin() {
    let (_, app) = app_at(0, Config::default());

    let request = Request::builder()
        .method("POST")
        .uri("/candidates/Adam")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(body_string(response).await, "1");

    let request = Request::builder()
        .method("POST")
        .uri("/candidates/Adam")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(body_string(response).await, OVER_LIMIT_BODY);
}

#[tokio::test]
async fn forwarded_origin_used_only_when_trusted() {
    let config = Config {
        trust_proxy_headers: true,
        ..Config::default()
    };
    let (_, app) = app_at(0, config);

    // 同一个连接地址，不同的代理头，各自独立限流
    for client in ["1.1.1.1", "2.2.2.2"] {
        let mut request = vote_request("Adam", "10.0.0.1");
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        let response = app.clone().oneshot(request).await.unwrap();
        assert_ne!(body_string(response).await, OVER_LIMIT_BODY);
    }
}

struct UnavailableStore;

#[async_trait]
impl CounterStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<i64>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn incr_with_expiry(&self, _key: &str, _ttl_secs: u64) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn incr_vote(
        &self,
        _total_key: &str,
        _bucket_key: &str,
        _bucket_ttl_secs: u64,
    ) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn mget(&self, _keys: &[String]) -> Result<Vec<Option<i64>>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn store_failure_returns_server_error() {
    let config = Config {
        seed_candidates: vec!["Adam".to_string()],
        ..Config::default()
    };
    let state = AppState::new(
        config,
        Arc::new(UnavailableStore),
        Arc::new(ManualClock::new(0)),
    );
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(vote_request("Bob", "10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], 500);
    assert!(
        json["error_message"]
            .as_str()
            .unwrap()
            .contains("connection refused")
    );

    let response = app.oneshot(get_request("/candidates")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
