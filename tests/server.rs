//! Real-socket tests: server lifecycle, hot policy reload, admin API.

use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;

use route_dispatch::admin::{run_admin, AdminState};
use route_dispatch::config::RoutingConfig;
use route_dispatch::http::HttpServer;
use route_dispatch::lifecycle::Shutdown;
use route_dispatch::routing::{Endpoint, RouteTable};

mod common;

#[tokio::test]
async fn test_serves_and_shuts_down_gracefully() {
    let mut table = RouteTable::new(RoutingConfig::default());
    table.register(Endpoint::get("/user/:id", common::echo_params));
    let running = common::spawn_server(HttpServer::new(common::config(), table)).await;

    let client = common::client();
    let res = client
        .get(format!("http://{}/user/42", running.addr))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], "42");

    let res = client
        .delete(format!("http://{}/user/42", running.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 405);
    assert_eq!(res.headers()["allow"], "GET");

    assert!(running.shutdown.trigger());
    let result = tokio::time::timeout(Duration::from_secs(5), running.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_config_reload_updates_throttle() {
    let mut table = RouteTable::new(RoutingConfig::default());
    table.register(Endpoint::get("/ping", common::ok));
    let config = common::config();
    let running = common::spawn_server(HttpServer::new(config.clone(), table)).await;
    let url = format!("http://{}/ping", running.addr);
    let client = common::client();

    for _ in 0..3 {
        assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    }

    let mut reloaded = config;
    reloaded.throttle.ttl_secs = 60;
    reloaded.throttle.limit = 2;
    running.updates.send(reloaded).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert!(res.headers().contains_key("retry-after"));

    running.shutdown.trigger();
}

#[tokio::test]
async fn test_admin_api() {
    let mut table = RouteTable::new(RoutingConfig::default());
    table
        .register(Endpoint::get("/feed", common::ok))
        .register(Endpoint::get("/feed", common::ok))
        .register(Endpoint::get("/user/:id", common::echo_params));
    let mut config = common::config();
    config.cache.ttl_secs = 60;
    config.cache.limit = 4;
    let server = HttpServer::new(config, table);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let state = AdminState::new(server.state(), "secret");
    tokio::spawn(run_admin(listener, state, shutdown.subscribe()));

    let running = common::spawn_server(server).await;
    let client = common::client();
    client
        .get(format!("http://{}/feed", running.addr))
        .send()
        .await
        .unwrap();

    let admin = |path: &str| format!("http://{}{}", admin_addr, path);

    let res = client.get(admin("/admin/status")).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let status: Value = client
        .get(admin("/admin/status"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["routes"], 2);
    assert_eq!(status["conflicts"], 1);

    let routes: Value = client
        .get(admin("/admin/routes"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(routes["routes"][0]["pattern"], "/feed");
    assert_eq!(routes["routes"][0]["params"], serde_json::json!([]));
    assert_eq!(routes["routes"][1]["params"], serde_json::json!(["id"]));
    assert_eq!(routes["conflicts"][0]["method"], "GET");

    let cache: Value = client
        .get(admin("/admin/cache"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cache["urls"], 1);
    assert_eq!(cache["entries"], 1);

    let cleared: Value = client
        .delete(admin("/admin/cache"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["removed"], 1);

    let throttle: Value = client
        .get(admin("/admin/throttle"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(throttle["limit"], 0);
    assert_eq!(throttle["tracked"], 0);

    shutdown.trigger();
    running.shutdown.trigger();
}
