use std::time::Duration;

use cellarbook_api::app::{build_app, services::build_services};
use cellarbook_api::config::ApiConfig;
use cellarbook_core::{ItemId, PeriodId};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let config = ApiConfig {
            sse_heartbeat: Duration::from_secs(1),
            ..ApiConfig::default()
        };
        let app = build_app(build_services(&config));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn decimal(body: &Value, pointer: &str) -> Decimal {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("no decimal at {pointer} in {body}"))
        .parse()
        .unwrap()
}

/// Seeds a 12-bottle case of lager at 1.23 a bottle.
async fn seed_lager(client: &reqwest::Client, srv: &TestServer) -> ItemId {
    let item_id = ItemId::new();
    let res = client
        .put(srv.url(&format!("/catalog/items/{}", item_id)))
        .json(&json!({
            "sku": "LAGER-330",
            "name": "Lager 330ml",
            "category": "bottled_beer",
            "container_size": "12",
            "serving_size": "1",
            "unit_cost": "14.76",
            "valuation_cost": "1.23",
            "menu_price": "4.50",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    item_id
}

async fn create_month(client: &reqwest::Client, srv: &TestServer, month: u32) -> String {
    let res = client
        .post(srv.url("/periods"))
        .json(&json!({ "kind": "month", "year": 2026, "month": month }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

async fn populate_and_first_line(
    client: &reqwest::Client,
    srv: &TestServer,
    period_id: &str,
) -> String {
    let res = client
        .post(srv.url(&format!("/periods/{}/populate", period_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["lines_created"], 1);

    let view: Value = client
        .get(srv.url(&format!("/periods/{}", period_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    view["lines"][0]["id"].as_str().unwrap().to_string()
}

async fn post_movement(
    client: &reqwest::Client,
    srv: &TestServer,
    period_id: &str,
    line_id: &str,
    movement_type: &str,
    quantity: &str,
) -> reqwest::Response {
    client
        .post(srv.url(&format!("/periods/{}/lines/{}/movements", period_id, line_id)))
        .json(&json!({ "movement_type": movement_type, "quantity": quantity }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn bottled_beer_stocktake_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    seed_lager(&client, &srv).await;
    let period_id = create_month(&client, &srv, 3).await;
    let line_id = populate_and_first_line(&client, &srv, &period_id).await;

    let res = post_movement(&client, &srv, &period_id, &line_id, "purchase", "12.43").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = post_movement(&client, &srv, &period_id, &line_id, "waste", "1.00").await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .put(srv.url(&format!("/periods/{}/lines/{}/count", period_id, line_id)))
        .json(&json!({ "full_units": "1", "partial_units": "2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let line: Value = res.json().await.unwrap();
    assert_eq!(decimal(&line, "/figures/expected_qty"), dec!(11.43));
    assert_eq!(decimal(&line, "/figures/counted_qty"), dec!(14));
    assert_eq!(decimal(&line, "/figures/variance_qty"), dec!(2.57));
    assert_eq!(decimal(&line, "/figures/expected_value"), dec!(13.53));
    assert_eq!(decimal(&line, "/figures/counted_value"), dec!(17.22));
    assert_eq!(decimal(&line, "/figures/variance_value"), dec!(3.69));

    let movements: Value = client
        .get(srv.url(&format!("/periods/{}/lines/{}/movements", period_id, line_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(movements.as_array().unwrap().len(), 2);

    let res = client
        .post(srv.url(&format!("/periods/{}/close", period_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let closed: Value = res.json().await.unwrap();
    assert_eq!(closed["period"]["state"], "closed");
    assert_eq!(closed["snapshots_written"], 1);

    let snapshots: Value = client
        .get(srv.url(&format!("/periods/{}/snapshots", period_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshots.as_array().unwrap().len(), 1);
    assert_eq!(decimal(&snapshots, "/0/closing_qty"), dec!(14));
    assert_eq!(decimal(&snapshots, "/0/closing_value"), dec!(17.22));

    // Closed periods refuse edits.
    let res = post_movement(&client, &srv, &period_id, &line_id, "purchase", "1").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "locked_period");

    let res = client
        .post(srv.url(&format!("/periods/{}/reopen", period_id)))
        .json(&json!({ "actor": "night manager", "reason": "late delivery note" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let reopened: Value = res.json().await.unwrap();
    assert_eq!(reopened["state"], "open");
    assert_eq!(reopened["revision"], 2);
}

#[tokio::test]
async fn close_reports_uncounted_lines_until_forced() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    seed_lager(&client, &srv).await;
    let period_id = create_month(&client, &srv, 4).await;
    let line_id = populate_and_first_line(&client, &srv, &period_id).await;

    let res = client
        .post(srv.url(&format!("/periods/{}/close", period_id)))
        .json(&json!({ "force": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "uncounted_lines");
    assert_eq!(body["line_ids"], json!([line_id]));

    // The failed close left the period open.
    let view: Value = client
        .get(srv.url(&format!("/periods/{}", period_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["period"]["state"], "open");

    let res = client
        .post(srv.url(&format!("/periods/{}/close", period_id)))
        .json(&json!({ "force": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let closed: Value = res.json().await.unwrap();
    assert_eq!(closed["anomalies"], json!([line_id]));
}

#[tokio::test]
async fn bad_requests_map_to_error_bodies() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/periods/not-a-uuid")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let res = client
        .get(srv.url(&format!("/periods/{}", PeriodId::new())))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    seed_lager(&client, &srv).await;
    let period_id = create_month(&client, &srv, 5).await;
    let line_id = populate_and_first_line(&client, &srv, &period_id).await;

    let res = post_movement(&client, &srv, &period_id, &line_id, "purchase", "0").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // A second populate is refused.
    let res = client
        .post(srv.url(&format!("/periods/{}/populate", period_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "already_populated");
}

#[tokio::test]
async fn oversized_quantities_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let item_id = seed_lager(&client, &srv).await;
    let period_id = create_month(&client, &srv, 7).await;
    let line_id = populate_and_first_line(&client, &srv, &period_id).await;
    let huge = "70000000000000000000000000000";

    let res = post_movement(&client, &srv, &period_id, &line_id, "purchase", huge).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .put(srv.url(&format!("/periods/{}/lines/{}/count", period_id, line_id)))
        .json(&json!({ "full_units": huge, "partial_units": "0" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url(&format!("/catalog/items/{}/movements", item_id)))
        .json(&json!({ "on": "2026-07-15", "quantity": huge }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // The same line still takes ordinary movements.
    let res = post_movement(&client, &srv, &period_id, &line_id, "purchase", "6").await;
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn viewer_stream_receives_recalculated_lines() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    seed_lager(&client, &srv).await;
    let period_id = create_month(&client, &srv, 6).await;
    let line_id = populate_and_first_line(&client, &srv, &period_id).await;

    let mut stream = client
        .get(srv.url(&format!("/periods/{}/stream", period_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), StatusCode::OK);

    let res = post_movement(&client, &srv, &period_id, &line_id, "purchase", "6").await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        let mut buf = String::new();
        while let Some(chunk) = stream.chunk().await.unwrap() {
            buf.push_str(&String::from_utf8_lossy(&chunk));
            if buf.contains("stocktake.line.recalculated") {
                return buf;
            }
        }
        buf
    })
    .await
    .expect("no recalculation reached the viewer");

    assert!(received.contains(&line_id));
    assert!(received.contains("movement_recorded"));
}
