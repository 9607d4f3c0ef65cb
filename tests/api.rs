use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use roomgrid::booker::BookingApp;
use roomgrid::gate::GateApp;
use roomgrid::server;
use roomgrid::store::BookingStore;
use roomgrid::sync::NoopSync;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;

const PASSWORD: &str = "kvarngatan";

fn test_router(dir: &tempfile::TempDir) -> Router {
    let config_dir = dir.path().join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("rooms.json"),
        r#"["Styrelsen", "Visionären", "Coffice"]"#,
    )
    .unwrap();
    std::fs::write(
        config_dir.join("grid.json"),
        r#"{ "start": "07:00", "slot_minutes": 30, "slot_count": 25 }"#,
    )
    .unwrap();

    let store = BookingStore::open(dir.path().join("bookings.json")).unwrap();
    let book_app = Arc::new(RwLock::new(
        BookingApp::from_config(config_dir.to_str().unwrap(), store, Arc::new(NoopSync)).unwrap(),
    ));
    let gate_app = Arc::new(RwLock::new(GateApp::new(PASSWORD.to_string())));
    server::app(book_app, gate_app, None)
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "password": PASSWORD }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login must set the session cookie")
        .to_str()
        .unwrap();
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair before attributes")
        .to_string()
}

async fn request(app: &Router, builder: axum::http::request::Builder, body: Body) -> (StatusCode, String) {
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

fn post_booking(cookie: &str) -> axum::http::request::Builder {
    Request::post("/api/book/bookings")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie.to_string())
}

#[tokio::test]
async fn gate_rejects_wrong_password_and_missing_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(&dir);

    let (status, _) = request(
        &app,
        Request::post("/api/login").header(header::CONTENT_TYPE, "application/json"),
        Body::from(json!({ "password": "fel" }).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&app, Request::get("/api/book/rooms"), Body::empty()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(&dir);
    let cookie = login(&app).await;

    // create
    let (status, body) = request(
        &app,
        post_booking(&cookie),
        Body::from(
            json!({
                "room": "Styrelsen",
                "date": "2024-01-01",
                "start_time": "09:00",
                "end_time": "10:00",
                "info": "Standup"
            })
            .to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // overlapping proposal is a conflict
    let (status, body) = request(
        &app,
        post_booking(&cookie),
        Body::from(
            json!({
                "room": "Styrelsen",
                "date": "2024-01-01",
                "start_time": "09:30",
                "end_time": "10:30",
                "info": "Overrun"
            })
            .to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    // touching boundary succeeds
    let (status, _) = request(
        &app,
        post_booking(&cookie),
        Body::from(
            json!({
                "room": "Styrelsen",
                "date": "2024-01-01",
                "start_time": "10:00",
                "end_time": "10:30",
                "info": "Retro"
            })
            .to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // list for the date
    let (status, body) = request(
        &app,
        Request::get("/api/book/bookings?date=2024-01-01").header(header::COOKIE, cookie.clone()),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);

    // grid cell occupancy
    let (status, body) = request(
        &app,
        Request::get("/api/book/grid?date=2024-01-01").header(header::COOKIE, cookie.clone()),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let grid: Value = serde_json::from_str(&body).unwrap();
    let rows = grid.as_array().unwrap();
    assert_eq!(rows.len(), 25);
    let nine_thirty = rows
        .iter()
        .find(|row| row["slot"] == "09:30")
        .expect("grid has a 09:30 row");
    assert_eq!(nine_thirty["cells"][0]["info"], "Standup");
    assert!(nine_thirty["cells"][1].is_null());

    // delete, then the slot reads free; a second delete is still 200
    for _ in 0..2 {
        let (status, _) = request(
            &app,
            Request::delete("/api/book/bookings/Styrelsen/2024-01-01/09:00")
                .header(header::COOKIE, cookie.clone()),
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = request(
        &app,
        Request::get("/api/book/bookings?date=2024-01-01").header(header::COOKIE, cookie.clone()),
        Body::empty(),
    )
    .await;
    let listed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn recurring_conflict_is_all_or_nothing_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(&dir);
    let cookie = login(&app).await;

    // occupy the middle week only
    let (status, _) = request(
        &app,
        post_booking(&cookie),
        Body::from(
            json!({
                "room": "Coffice",
                "date": "2024-01-08",
                "start_time": "13:00",
                "end_time": "14:00",
                "info": "Board meeting"
            })
            .to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &app,
        post_booking(&cookie),
        Body::from(
            json!({
                "room": "Coffice",
                "date": "2024-01-01",
                "start_time": "13:00",
                "end_time": "14:00",
                "info": "Weekly sync",
                "repeat_weeks": 3
            })
            .to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    // the failing week is named so the user can adjust the range
    assert!(body.contains("2024-01-08"), "{body}");

    for day in ["2024-01-01", "2024-01-15"] {
        let (_, body) = request(
            &app,
            Request::get(format!("/api/book/bookings?date={day}"))
                .header(header::COOKIE, cookie.clone()),
            Body::empty(),
        )
        .await;
        let listed: Value = serde_json::from_str(&body).unwrap();
        assert!(listed.as_array().unwrap().is_empty(), "{day} must stay empty");
    }
}

#[tokio::test]
async fn validation_errors_are_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(&dir);
    let cookie = login(&app).await;

    let cases = [
        json!({ "room": "Styrelsen", "date": "2024-01-01", "start_time": "09:00", "end_time": "10:00", "info": "  " }),
        json!({ "room": "Styrelsen", "date": "2024-01-01", "start_time": "10:00", "end_time": "09:00", "info": "Backwards" }),
        json!({ "room": "Styrelsen", "date": "2024-01-01", "start_time": "09:00", "end_time": "09:15", "info": "Off grid" }),
        json!({ "room": "Garaget", "date": "2024-01-01", "start_time": "09:00", "end_time": "10:00", "info": "No such room" }),
        json!({ "room": "Styrelsen", "date": "not-a-date", "start_time": "09:00", "end_time": "10:00", "info": "Bad date" }),
        json!({ "room": "Styrelsen", "date": "2024-01-01", "start_time": "09:00", "end_time": "10:00", "info": "Runaway", "repeat_weeks": u32::MAX }),
        json!({ "room": "Styrelsen", "date": "2024-01-01", "start_time": "09:00", "end_time": "10:00", "info": "Never", "repeat_weeks": 0 }),
    ];
    for case in cases {
        let (status, body) =
            request(&app, post_booking(&cookie), Body::from(case.to_string())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    }
}

#[tokio::test]
async fn slot_picker_endpoints_follow_the_grid() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(&dir);
    let cookie = login(&app).await;

    let (status, body) = request(
        &app,
        Request::get("/api/book/slots").header(header::COOKIE, cookie.clone()),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let slots: Vec<String> = serde_json::from_str(&body).unwrap();
    assert_eq!(slots.len(), 25);
    assert_eq!(slots[0], "07:00");

    let (status, body) = request(
        &app,
        Request::get("/api/book/slots?after=18:30").header(header::COOKIE, cookie.clone()),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ends: Vec<String> = serde_json::from_str(&body).unwrap();
    assert_eq!(ends, vec!["19:00".to_string()]);

    let (status, _) = request(
        &app,
        Request::get("/api/book/slots?after=06:45").header(header::COOKIE, cookie),
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
