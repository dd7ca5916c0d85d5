use api_lib::web::{self, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ecoplot_core::memory::InMemoryStore;
use ecoplot_core::{RecommendationClient, RecommendationError, RecommendationPipeline};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

struct CannedClient(&'static str);

#[async_trait]
impl RecommendationClient for CannedClient {
    fn ensure_configured(&self) -> Result<(), RecommendationError> {
        Ok(())
    }

    async fn complete(&self, _prompt: &str) -> Result<String, RecommendationError> {
        Ok(self.0.to_string())
    }
}

const ANSWER: &str = "```json\n{\"overall_recommendations\": [\"Use the pump at noon\"], \
    \"device_recommendations\": {\"1\": {\"name\": \"Pool Pump\", \"recommendation\": \"Noon\", \"estimated_savings\": 9.5}}, \
    \"estimated_monthly_savings\": 9.5}\n```";

struct TestApp {
    router: Router,
    pump_type: i32,
    pump_brand: i32,
}

impl TestApp {
    fn new(answer: &'static str) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let pump_type = store.add_device_type("Pool Pump").unwrap();
        let pump_brand = store.add_brand(pump_type, "Hayward").unwrap();

        let pipeline = RecommendationPipeline::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(CannedClient(answer)),
        );
        let state = Arc::new(AppState {
            profiles: store.clone(),
            devices: store.clone(),
            pipeline: Arc::new(pipeline),
        });

        Self {
            router: web::router(state),
            pump_type,
            pump_brand,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    async fn add_pump(&self, user: Uuid) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/devices",
                Some(user),
                Some(json!({
                    "name": "Pool Pump",
                    "device_type_id": self.pump_type,
                    "brand_id": self.pump_brand,
                    "power_consumption_watts": 1100.0,
                    "is_schedulable": true
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn user_routes_require_the_header() {
    let app = TestApp::new(ANSWER);

    let (status, _) = app.send("GET", "/profile", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/profile")
        .header("x-user-id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn first_request_creates_an_empty_profile() {
    let app = TestApp::new(ANSWER);
    let user = Uuid::new_v4();

    let (status, body) = app.send("GET", "/profile", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user.to_string());
    assert_eq!(body["has_solar"], false);
}

#[tokio::test]
async fn profile_update_is_allow_listed() {
    let app = TestApp::new(ANSWER);
    let user = Uuid::new_v4();

    let (status, body) = app
        .send(
            "PUT",
            "/profile",
            Some(user),
            Some(json!({"has_solar": true, "solar_capacity_kw": 5.0, "city": "Austin"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_solar"], true);
    assert_eq!(body["solar_capacity_kw"], 5.0);

    let (status, _) = app
        .send("PUT", "/profile", Some(user), Some(json!({"user_id": Uuid::new_v4()})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, body) = app.send("GET", "/profile", Some(user), None).await;
    assert_eq!(body["user_id"], user.to_string());
    assert_eq!(body["city"], "Austin");
}

#[tokio::test]
async fn devices_can_be_added_listed_and_deleted() {
    let app = TestApp::new(ANSWER);
    let user = Uuid::new_v4();

    let created = app.add_pump(user).await;
    assert_eq!(created["device_type_name"], "Pool Pump");
    assert_eq!(created["brand_name"], "Hayward");
    let id = created["id"].as_i64().unwrap();

    let (_, list) = app.send("GET", "/devices", Some(user), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send("DELETE", &format!("/devices/{}", id), Some(Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("DELETE", &format!("/devices/{}", id), Some(user), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = app.send("GET", "/devices", Some(user), None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn devices_can_be_read_and_updated_by_their_owner() {
    let app = TestApp::new(ANSWER);
    let owner = Uuid::new_v4();
    let id = app.add_pump(owner).await["id"].as_i64().unwrap();
    let uri = format!("/devices/{}", id);

    let (status, device) = app.send("GET", &uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(device["name"], "Pool Pump");

    let (status, device) = app
        .send(
            "PUT",
            &uri,
            Some(owner),
            Some(json!({"name": "Backyard Pump", "usage_flexibility": 8, "is_schedulable": null})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", device);
    assert_eq!(device["name"], "Backyard Pump");
    assert_eq!(device["usage_flexibility"], 8);
    assert_eq!(device["is_schedulable"], true);
    assert_eq!(device["power_consumption_watts"], 1100.0);

    let (status, device) = app
        .send("PUT", &uri, Some(owner), Some(json!({"usage_flexibility": null})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(device["usage_flexibility"], Value::Null);
}

#[tokio::test]
async fn device_update_is_allow_listed_and_owner_scoped() {
    let app = TestApp::new(ANSWER);
    let owner = Uuid::new_v4();
    let id = app.add_pump(owner).await["id"].as_i64().unwrap();
    let uri = format!("/devices/{}", id);

    let (status, _) = app
        .send("PUT", &uri, Some(owner), Some(json!({"user_id": Uuid::new_v4()})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .send("PUT", &uri, Some(owner), Some(json!({"priority_level": 11})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stranger = Uuid::new_v4();
    let (status, _) = app
        .send("PUT", &uri, Some(stranger), Some(json!({"name": "Mine now"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send("GET", &uri, Some(stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, device) = app.send("GET", &uri, Some(owner), None).await;
    assert_eq!(device["name"], "Pool Pump");
}

#[tokio::test]
async fn profile_fields_can_be_cleared_with_null() {
    let app = TestApp::new(ANSWER);
    let user = Uuid::new_v4();

    app.send(
        "PUT",
        "/profile",
        Some(user),
        Some(json!({"city": "Austin", "electricity_rate_plan": "TOU-A"})),
    )
    .await;
    let (status, body) = app
        .send("PUT", "/profile", Some(user), Some(json!({"electricity_rate_plan": null})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["electricity_rate_plan"], Value::Null);
    assert_eq!(body["city"], "Austin");
}

#[tokio::test]
async fn negative_power_is_rejected() {
    let app = TestApp::new(ANSWER);
    let (status, _) = app
        .send(
            "POST",
            "/devices",
            Some(Uuid::new_v4()),
            Some(json!({
                "name": "Heater",
                "device_type_id": app.pump_type,
                "brand_id": app.pump_brand,
                "power_consumption_watts": -5.0
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recommendations_without_devices_is_a_bad_request() {
    let app = TestApp::new(ANSWER);
    let (status, body) = app
        .send("GET", "/recommendations", Some(Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.as_str().unwrap().contains("No devices found"));
}

#[tokio::test]
async fn recommendations_are_generated_and_recorded() {
    let app = TestApp::new(ANSWER);
    let user = Uuid::new_v4();
    app.add_pump(user).await;

    let (status, body) = app.send("GET", "/recommendations", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["devices_count"], 1);
    assert_eq!(body["recommendations"]["success"], true);
    assert_eq!(
        body["recommendations"]["recommendations"]["device_recommendations"]["1"]["name"],
        "Pool Pump"
    );
    assert_eq!(
        body["recommendations"]["recommendations"]["energy_saving_tips"],
        json!([])
    );

    let (status, history) = app
        .send("GET", "/recommendations/history?limit=5", Some(user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = history["history"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["device_count"], 1);
    assert_eq!(entries[0]["estimated_monthly_savings"], 9.5);
    assert_eq!(entries[0]["id"], body["history_id"]);
}

#[tokio::test]
async fn unparseable_answer_is_reported_inside_the_result() {
    let app = TestApp::new("Sorry, I cannot help with that.");
    let user = Uuid::new_v4();
    app.add_pump(user).await;

    let (status, body) = app.send("GET", "/recommendations", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recommendations"]["success"], false);
    assert_eq!(
        body["recommendations"]["error"],
        "No valid JSON structure found in response"
    );
    assert_eq!(body["history_id"], Value::Null);

    let (_, list) = app
        .send("GET", "/recommendations/history", Some(user), None)
        .await;
    assert!(list["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn device_recommendations_check_ownership() {
    let app = TestApp::new(ANSWER);
    let owner = Uuid::new_v4();
    let id = app.add_pump(owner).await["id"].as_i64().unwrap();

    let (status, body) = app
        .send("GET", &format!("/recommendations/device/{}", id), Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device"]["name"], "Pool Pump");
    assert_eq!(body["recommendations"]["success"], true);

    let (status, _) = app
        .send("GET", &format!("/recommendations/device/{}", id), Some(Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_lists_types_and_brands() {
    let app = TestApp::new(ANSWER);

    let (status, types) = app.send("GET", "/device-types", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(types[0]["name"], "Pool Pump");

    let (_, brands) = app
        .send("GET", &format!("/device-types/{}/brands", app.pump_type), None, None)
        .await;
    assert_eq!(brands[0]["name"], "Hayward");
}
