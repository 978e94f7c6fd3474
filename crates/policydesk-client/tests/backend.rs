use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use policydesk_client::{BackendClient, ClientError, Directory, HttpDirectory};
use policydesk_core::kinds::PersonKind;
use policydesk_core::{
    CarInsurancePeriodUnit, CreatePolicyRequest, OsagoData, OsagoZone, PolicyData, PolicyStatus,
    PolicyType, Reference, Suggestion,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Fake {
    posted: Arc<Mutex<Vec<Value>>>,
}

fn person_json(id: i32, first_name: &str) -> Value {
    json!({
        "id": id,
        "first_name": first_name,
        "first_name_lat": null,
        "last_name": "Lee",
        "last_name_lat": null,
        "patronymic_name": null,
        "patronymic_name_lat": null,
        "sex": "F",
        "birth_date": "1990-04-12",
        "tax_number": "1234567890",
        "phone": "+380501112233",
        "phone2": null,
        "email": "ann@example.com",
        "status": "Active"
    })
}

async fn search_people(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let q = params.get("q").cloned().unwrap_or_default().to_lowercase();
    let rows: Vec<Value> = [(5, "Ann Lee"), (6, "Bohdan Lee")]
        .into_iter()
        .filter(|(_, label)| label.to_lowercase().contains(&q))
        .map(|(id, label)| json!({"id": id, "label": label}))
        .collect();
    Json(Value::Array(rows))
}

async fn get_person(Path(id): Path<i32>) -> impl IntoResponse {
    match id {
        5 => (StatusCode::OK, Json(person_json(5, "Ann"))).into_response(),
        _ => (StatusCode::NOT_FOUND, "no such person").into_response(),
    }
}

async fn get_policy(Path(_id): Path<i32>) -> Json<Value> {
    Json(json!({"unexpected": true}))
}

async fn create_policy(State(fake): State<Fake>, Json(body): Json<Value>) -> Json<Value> {
    fake.posted.lock().unwrap().push(body);
    Json(json!({
        "id": 31,
        "policy_type": "Osago",
        "holder_id": 5,
        "series": "EP",
        "number": "000123",
        "start_date": "2025-01-01",
        "end_date": null,
        "status": "Project"
    }))
}

async fn agents() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, "session=abc; Path=/")],
        Json(json!([{"id": 4, "full_name": "Petro Shevchenko"}])),
    )
}

async fn dashboard(headers: HeaderMap) -> impl IntoResponse {
    let has_session = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("session=abc"));
    if !has_session {
        return (StatusCode::UNAUTHORIZED, "login").into_response();
    }
    Json(json!({
        "people_count": 2,
        "policy_count": 1,
        "car_count": 1,
        "upcoming_birthdays": [],
        "expiring_policies": []
    }))
    .into_response()
}

async fn auth_me() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, "no session")
}

async fn broken() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn serve(fake: Fake) -> String {
    let app = Router::new()
        .route("/api/people/search", get(search_people))
        .route("/api/people/{id}", get(get_person))
        .route("/api/policies", get(broken).post(create_policy))
        .route("/api/policies/{id}", get(get_policy))
        .route("/api/agents", get(agents))
        .route("/api/dashboard", get(dashboard))
        .route("/api/auth/{what}", get(auth_me))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

async fn client(fake: Fake) -> BackendClient {
    let base = serve(fake).await;
    BackendClient::with_base_url(&base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn search_maps_rows_to_suggestions() {
    let client = client(Fake::default()).await;
    let hits = client.search_people("bohdan").await.unwrap();
    assert_eq!(
        hits,
        vec![Suggestion {
            value: 6,
            label: "Bohdan Lee".to_string()
        }]
    );
}

#[tokio::test]
async fn http_directory_uses_the_kind_collection() {
    let client = client(Fake::default()).await;
    let people = HttpDirectory::<PersonKind>::new(client);

    let ann = people.fetch(5).await.unwrap();
    assert_eq!(ann.label(), "Ann Lee");
    let missing = people.fetch(9).await.unwrap_err();
    assert!(matches!(missing, ClientError::NotFound(ref path) if path == "people/9"));
}

#[tokio::test]
async fn policy_body_is_posted_with_discriminators() {
    let fake = Fake::default();
    let client = client(fake.clone()).await;
    let request = CreatePolicyRequest {
        holder: Reference::Existing { id: 5 },
        series: "EP".to_string(),
        number: "000123".to_string(),
        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        end_date: None,
        status: PolicyStatus::Project,
        agent_ids: vec![4],
        data: PolicyData::Osago(OsagoData {
            period_in_units: 12,
            period_unit: CarInsurancePeriodUnit::Month,
            zone: OsagoZone::Zone2,
            exempt: "none".to_string(),
            premium: 2400,
            car: Reference::Existing { id: 3 },
        }),
    };

    let response = client.create_policy(&request).await.unwrap();
    assert_eq!(response.id, 31);
    assert_eq!(response.policy_type, PolicyType::Osago);

    let posted = fake.posted.lock().unwrap().pop().unwrap();
    assert_eq!(posted["policy_type"], "Osago");
    assert_eq!(posted["holder"], json!({"kind": "Existing", "id": 5}));
    assert_eq!(posted["car"], json!({"kind": "Existing", "id": 3}));
    assert_eq!(posted["agent_ids"], json!([4]));
}

#[tokio::test]
async fn session_cookie_is_sent_on_later_requests() {
    let client = client(Fake::default()).await;
    assert!(matches!(client.dashboard().await, Err(ClientError::Unauthorized)));

    let agents = client.list_agents().await.unwrap();
    assert_eq!(agents[0].full_name, "Petro Shevchenko");

    let stats = client.dashboard().await.unwrap();
    assert_eq!(stats.people_count, 2);
}

#[tokio::test]
async fn unauthorized_on_auth_endpoints_is_a_plain_status() {
    let client = client(Fake::default()).await;
    let err = client.fetch::<Value>("auth", 1).await.unwrap_err();
    assert!(matches!(err, ClientError::Status { code: 401, .. }));
}

#[tokio::test]
async fn server_errors_and_bad_bodies_are_distinguished() {
    let client = client(Fake::default()).await;

    let err = client.list_policies().await.unwrap_err();
    assert!(matches!(err, ClientError::Status { code: 500, ref body, .. } if body == "boom"));

    let err = client.get_policy(1).await.unwrap_err();
    assert!(matches!(err, ClientError::Decode { .. }));
}

#[test]
fn base_url_must_be_http() {
    let err = BackendClient::with_base_url("ftp://example.com", Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, ClientError::InvalidUrl(_)));
    assert!(BackendClient::with_base_url("not a url", Duration::from_secs(1)).is_err());

    let client = BackendClient::with_base_url("http://example.com/api", Duration::from_secs(1)).unwrap();
    assert_eq!(client.base_url().as_str(), "http://example.com/api/");
}
