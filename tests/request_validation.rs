mod common;

use std::fs;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use common::{peer, site_with, test_settings};
use webconf::{ConfigStore, EngineSettings, HttpServer};

const SITE: &str = r#"
Site
    hostname             example.com
    alternate-hostnames  www.example.com
maintenance-window off
HTTP
    allowed-methods      GET, HEAD
URLPaths
    restrict-paths       /accounting
    exclude-paths        /drafts
    forward-paths        /old-blog|/blog
    conditional-http-service [{"rule-type":"header","url-path":"/robots.txt","serve-only-to-criteria":["bingbot"],"http-status-code":404}]
"#;

fn app(store: &std::sync::Arc<ConfigStore>, from: SocketAddr) -> Router {
    let public = &store.layout().public_dir;
    fs::write(public.join("index.html"), "<h1>home</h1>").unwrap();
    fs::write(public.join("robots.txt"), "User-agent: *\n").unwrap();
    HttpServer::new(store.clone()).router().layer(MockConnectInfo(from))
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(header::HOST, "example.com")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn allowed_request_serves_file() {
    let (_temp, store) = site_with(SITE, test_settings());
    let response = app(&store, peer("203.0.113.7:40000")).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn validator_verdicts_map_to_status_codes() {
    let (_temp, store) = site_with(SITE, test_settings());
    let app = app(&store, peer("203.0.113.7:40000"));

    let post = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::HOST, "example.com")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(post).await.unwrap().status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(app.clone().oneshot(get("/accounting")).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.clone().oneshot(get("/drafts")).await.unwrap().status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(get("/Old-Blog")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/blog");
}

#[tokio::test]
async fn conditional_rule_gates_robots() {
    let (_temp, store) = site_with(SITE, test_settings());
    let app = app(&store, peer("203.0.113.7:40000"));

    assert_eq!(app.clone().oneshot(get("/robots.txt")).await.unwrap().status(), StatusCode::NOT_FOUND);
    assert_eq!(app.clone().oneshot(get("/ROBOTS.TXT")).await.unwrap().status(), StatusCode::NOT_FOUND);

    let bot = Request::builder()
        .uri("/robots.txt")
        .header(header::HOST, "example.com")
        .header(header::USER_AGENT, "Mozilla/5.0 (compatible; bingbot/2.0)")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.oneshot(bot).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn blocked_peer_and_maintenance_window() {
    let (_temp, store) = site_with(SITE, test_settings());
    fs::write(&store.layout().blocked_ip_file, "192.0.2.66\n").unwrap();
    store.refresh().unwrap();

    let blocked = app(&store, peer("192.0.2.66:5555"));
    assert_eq!(blocked.oneshot(get("/")).await.unwrap().status(), StatusCode::FORBIDDEN);

    assert!(store.update_value("", "maintenance-window", "on").unwrap());
    let open = app(&store, peer("203.0.113.7:40000"));
    assert_eq!(open.oneshot(get("/")).await.unwrap().status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn host_check_applies_when_enabled() {
    let settings = EngineSettings {
        validate_remote_host: true,
        ..test_settings()
    };
    let (_temp, store) = site_with(SITE, settings);
    let app = app(&store, peer("203.0.113.7:40000"));

    let foreign = Request::builder()
        .uri("/")
        .header(header::HOST, "attacker.test")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(foreign).await.unwrap().status(), StatusCode::BAD_GATEWAY);

    let alternate = Request::builder()
        .uri("/")
        .header(header::HOST, "www.example.com:8085")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.oneshot(alternate).await.unwrap().status(), StatusCode::OK);
}
