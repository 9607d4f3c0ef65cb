use crate::api::{DateQuery, LoginPayload, NewBooking, SlotsQuery};
use crate::booker::{BookingApp, BookingError, BookingView, GridRow};
use crate::gate::{GateApp, SessionToken, TokenId, SESSION_COOKIE};
use crate::timegrid::Slot;
use axum::{
    debug_handler,
    extract::{self, Json, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, timeout::TimeoutLayer,
};
use tracing::{debug, error, trace};

type BookerState = (Arc<RwLock<BookingApp>>, Arc<RwLock<GateApp>>);

fn error_response(e: BookingError) -> (StatusCode, String) {
    let status = match e {
        BookingError::Conflict { .. } => StatusCode::CONFLICT,
        BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, e.to_string())
}

fn parse_date(text: &str) -> Result<NaiveDate, (StatusCode, String)> {
    text.parse()
        .map_err(|_| (StatusCode::UNPROCESSABLE_ENTITY, format!("Invalid date: {text}")))
}

fn parse_slot(text: &str) -> Result<Slot, (StatusCode, String)> {
    Slot::try_from(text)
        .map_err(|_| (StatusCode::UNPROCESSABLE_ENTITY, format!("Invalid timeslot: {text}")))
}

#[debug_handler]
async fn handle_new_booking(
    State((booker, gate)): State<BookerState>,
    cookies: CookieJar,
    extract::Json(payload): extract::Json<NewBooking>,
) -> Result<(StatusCode, Json<Vec<BookingView>>), (StatusCode, String)> {
    gate.read()
        .await
        .assert_login(cookies)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e))?;

    match booker.write().await.handle_new_booking(payload) {
        Ok(bookings) => Ok((
            StatusCode::OK,
            Json(bookings.iter().map(BookingView::from).collect()),
        )),
        Err(e) => {
            error!("Error creating new booking: {}", e);
            Err(error_response(e))
        }
    }
}

async fn handle_delete(
    State((booker, gate)): State<BookerState>,
    cookies: CookieJar,
    Path((room, date, start)): Path<(String, String, String)>,
) -> Result<(StatusCode, String), (StatusCode, String)> {
    debug!("Deleting booking: {room} {date} {start}");
    gate.read()
        .await
        .assert_login(cookies)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e))?;

    let date = parse_date(&date)?;
    let start = parse_slot(&start)?;
    match booker.write().await.remove(&room, date, start) {
        Ok(()) => Ok((StatusCode::OK, "Booking deleted".to_string())),
        Err(e) => {
            error!("Error deleting booking: {}", e);
            Err(error_response(e))
        }
    }
}

async fn handle_bookings(
    State((booker, gate)): State<BookerState>,
    cookies: CookieJar,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<BookingView>>, (StatusCode, String)> {
    gate.read()
        .await
        .assert_login(cookies)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e))?;

    let date = parse_date(&query.date)?;
    Ok(Json(booker.read().await.bookings_for_date(date)))
}

async fn handle_grid(
    State((booker, gate)): State<BookerState>,
    cookies: CookieJar,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<GridRow>>, (StatusCode, String)> {
    gate.read()
        .await
        .assert_login(cookies)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e))?;

    let date = parse_date(&query.date)?;
    Ok(Json(booker.read().await.grid_for_date(date)))
}

async fn handle_rooms(
    State((booker, gate)): State<BookerState>,
    cookies: CookieJar,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    gate.read()
        .await
        .assert_login(cookies)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e))?;

    Ok(Json(booker.read().await.rooms().to_vec()))
}

async fn handle_slots(
    State((booker, gate)): State<BookerState>,
    cookies: CookieJar,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    gate.read()
        .await
        .assert_login(cookies)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e))?;

    let after = query.after.as_deref().map(parse_slot).transpose()?;
    booker
        .read()
        .await
        .slot_labels(after)
        .map(Json)
        .map_err(error_response)
}

fn booking_api(book_app: Arc<RwLock<BookingApp>>, gate_app: Arc<RwLock<GateApp>>) -> Router {
    Router::new()
        .route("/bookings", post(handle_new_booking).get(handle_bookings))
        .route("/bookings/:room/:date/:start", delete(handle_delete))
        .route("/grid", get(handle_grid))
        .route("/rooms", get(handle_rooms))
        .route("/slots", get(handle_slots))
        .with_state((book_app, gate_app))
}

#[debug_handler]
async fn handle_login(
    State(gate_app): State<Arc<RwLock<GateApp>>>,
    cookies: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> Result<(StatusCode, CookieJar, Json<SessionToken>), (StatusCode, String)> {
    let mut gate_app = gate_app.write().await;
    match gate_app.authenticate(&payload.password) {
        Ok((cookie, session_token)) => {
            debug!("login succesful");
            let cookie = Cookie::parse(cookie)
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
            Ok((StatusCode::OK, cookies.add(cookie), Json(session_token)))
        }
        Err(e) => {
            debug!("Error logging in: {}", e);
            Err((StatusCode::UNAUTHORIZED, e))
        }
    }
}

async fn check_login(
    State(gate_app): State<Arc<RwLock<GateApp>>>,
    cookies: CookieJar,
) -> Result<(StatusCode, Json<SessionToken>), StatusCode> {
    let session_token = gate_app
        .read()
        .await
        .assert_login(cookies)
        .map_err(|_| StatusCode::OK)?;

    Ok((StatusCode::ACCEPTED, Json(session_token)))
}

async fn handle_logout(
    State(gate_app): State<Arc<RwLock<GateApp>>>,
    cookies: CookieJar,
) -> Result<StatusCode, StatusCode> {
    let token_id = TokenId::try_from(
        cookies
            .get(SESSION_COOKIE)
            .ok_or("No cookie found")
            .map_err(|e| {
                error!("Error logging out: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .value(),
    )
    .map_err(|e| {
        error!("Error logging out: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    gate_app.write().await.logout(&token_id).map_err(|e| {
        error!("Error logging out: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    debug!("logout succesful");
    Ok(StatusCode::OK)
}

fn gate_api(gate_app: Arc<RwLock<GateApp>>) -> Router {
    Router::new()
        .route("/login", post(handle_login))
        .route("/login", get(check_login))
        .route("/logout", get(handle_logout))
        .with_state(gate_app)
}

async fn cookie_helper(
    cookies: CookieJar,
    gate_app: Arc<RwLock<GateApp>>,
) -> Result<CookieJar, Box<dyn std::error::Error>> {
    let cookie = cookies.get(SESSION_COOKIE).ok_or("No cookie found")?;
    let token_id = TokenId::try_from(cookie.value())?;
    let cookie = gate_app
        .write()
        .await
        .update_token(&token_id)
        .map_err(|e| format!("Error updating token: {}", e))?;

    Ok(cookies.add(Cookie::parse(cookie)?))
}

async fn update_token(
    State(gate_app): State<Arc<RwLock<GateApp>>>,
    cookies: CookieJar,
    request: Request,
    next: Next,
) -> (CookieJar, Response) {
    trace!("{}, {}", request.method(), request.uri().path());
    let response = next.run(request).await;
    (
        cookie_helper(cookies, gate_app)
            .await
            .unwrap_or(CookieJar::new()),
        response,
    )
}

/// The full application router: booking and gate APIs behind the shared
/// middleware stack, plus an optional static frontend directory.
pub fn app(
    book_app: Arc<RwLock<BookingApp>>,
    gate_app: Arc<RwLock<GateApp>>,
    frontend_dir: Option<String>,
) -> Router {
    let middleware = tower::ServiceBuilder::new()
        .layer(CompressionLayer::new().quality(tower_http::CompressionLevel::Fastest))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(
            gate_app.clone(),
            update_token,
        ));

    let mut app = Router::new()
        .nest_service(
            "/api/book/",
            booking_api(book_app, gate_app.clone()).into_service(),
        )
        .nest_service("/api/", gate_api(gate_app).into_service())
        .layer(middleware);

    if let Some(dir) = frontend_dir {
        app = app.nest_service("/", ServeDir::new(dir));
    }
    app
}
