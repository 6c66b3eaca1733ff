use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::brand::StyleSheet;
use crate::bus::Event;
use crate::concierge::{
    dashboard::{SheetTab, Tab, ViewMode},
    listing::{parse_currency, PropertyId, DEFAULT_HOME_PRICE},
    mortgage::{self, MortgageInputs, DEFAULT_DOWN_PAYMENT_PERCENT, DEFAULT_INTEREST_RATE_PERCENT},
    view::DashboardView,
    visits::{RealtorResponse, VisitId},
};
use crate::error::ConciergeError;
use crate::manager::Manager;
use crate::session::ConciergeSession;

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

/// One user interaction with a dashboard.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SetTab { tab: Tab },
    ToggleOption { option: String },
    SendAnswer {
        #[serde(default)]
        text: Option<String>,
    },
    SelectProperty { property_id: PropertyId },
    CloseProperty,
    SetSheetTab { tab: SheetTab },
    ToggleSaved { property_id: PropertyId },
    ToggleCompareMode,
    OpenCompare,
    CloseCompare,
    RequestVisit { property_id: PropertyId },
    ScheduleTour,
    SubmitSchedule { date: String, time: String },
    CancelSchedule,
    PickNewTime { visit_id: VisitId },
    RealtorResponse { response: RealtorResponse },
    OpenPropertyChat,
    AskProperty { text: String },
    ClosePropertyChat,
    SetCalculator {
        down_payment_percent: u8,
        interest_rate_percent: f64,
        loan_term_years: u32,
    },
    NextRoom,
    PreviousRoom,
    SetViewMode { mode: ViewMode },
    ToggleDarkMode,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub dashboard: DashboardView,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub dashboard: DashboardView,
}

#[derive(Debug, Deserialize)]
pub struct MortgageQuery {
    pub price: Option<String>,
    pub down: Option<u8>,
    pub rate: Option<f64>,
    pub term: Option<u32>,
    pub hoa: Option<f64>,
}

// -----------------------------------------------------------------------------
// Router
// -----------------------------------------------------------------------------

pub struct AppState {
    pub manager: Arc<Manager>,
}

pub fn router(manager: Arc<Manager>) -> Router {
    let state = Arc::new(AppState { manager });

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/brand", get(brand_handler))
        .route("/brand/theme.css", get(theme_handler))
        .route("/mortgage", get(mortgage_handler))
        .route("/sessions", post(create_session_handler))
        .route(
            "/sessions/:id",
            get(snapshot_handler).delete(end_session_handler),
        )
        .route("/sessions/:id/events", get(events_handler))
        .route("/sessions/:id/actions", post(action_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

async fn brand_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let brand = &state.manager.catalog().brand;
    Json(json!({
        "brand": brand,
        "css_variables": brand.theme.css_variables(),
    }))
}

async fn theme_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sheet = StyleSheet::for_brand(&state.manager.catalog().brand);
    ([(header::CONTENT_TYPE, "text/css")], sheet.render())
}

async fn mortgage_handler(
    Query(query): Query<MortgageQuery>,
) -> Result<impl IntoResponse, ConciergeError> {
    let base_price = match query.price.as_deref() {
        Some(raw) => parse_currency(raw).filter(|p| *p > 0.0).ok_or_else(|| {
            ConciergeError::InvalidMortgageInput(format!("unreadable price: {}", raw))
        })?,
        None => DEFAULT_HOME_PRICE,
    };
    let hoa_monthly = query.hoa.unwrap_or(0.0);
    if !hoa_monthly.is_finite() || hoa_monthly < 0.0 {
        return Err(ConciergeError::InvalidMortgageInput(format!(
            "hoa must be a non-negative amount, got {}",
            hoa_monthly
        )));
    }

    let inputs = MortgageInputs {
        base_price,
        hoa_monthly,
        ..MortgageInputs::default()
    }
    .with_sliders(
        query.down.unwrap_or(DEFAULT_DOWN_PAYMENT_PERCENT),
        query.rate.unwrap_or(DEFAULT_INTEREST_RATE_PERCENT),
        query.term.unwrap_or(30),
    )?;

    Ok(Json(json!({
        "inputs": inputs,
        "breakdown": mortgage::calculate(&inputs),
    })))
}

async fn create_session_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.manager.create_session();
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.id().to_string(),
            dashboard: session.snapshot(),
        }),
    )
}

async fn snapshot_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DashboardView>, ConciergeError> {
    let session = state.manager.get(&id)?;
    Ok(Json(session.snapshot()))
}

async fn end_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ConciergeError> {
    state.manager.end_session(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, axum::BoxError>>>, ConciergeError> {
    state.manager.get(&id)?;
    info!("New SSE connection for session {}", id);

    let mut rx = state.manager.event_bus().subscribe();
    let manager = state.manager.clone();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let ours = match event.session() {
                        Some(session) => session == id,
                        None => true,
                    };
                    if !ours {
                        continue;
                    }

                    let closing = matches!(event, Event::SessionNotification { .. })
                        && !manager.contains(&id);
                    yield SseEvent::default()
                        .event(event.name())
                        .json_data(&event)
                        .map_err(axum::BoxError::from);
                    if closing {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SSE stream for {} lagged, skipped {} events", id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
        debug!("SSE stream for session {} closed", id);
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[axum::debug_handler]
async fn action_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(action): Json<Action>,
) -> Result<Json<ActionResponse>, ConciergeError> {
    let session = state.manager.get(&id)?;
    debug!("Session {} action: {:?}", id, action);

    let result = apply(&session, action)?;
    Ok(Json(ActionResponse {
        result,
        dashboard: session.snapshot(),
    }))
}

fn apply(session: &ConciergeSession, action: Action) -> Result<Option<Value>, ConciergeError> {
    let result = match action {
        Action::SetTab { tab } => {
            session.update(|d| d.set_tab(tab));
            None
        }
        Action::ToggleOption { option } => {
            let selection = session.update(|d| d.toggle_option(&option))?;
            Some(json!({ "selection": selection }))
        }
        Action::SendAnswer { text } => {
            let message = session.send_answer(text.as_deref())?;
            Some(json!({ "message": message }))
        }
        Action::SelectProperty { property_id } => {
            let tap = session.update(|d| d.tap_card(property_id))?;
            Some(json!({ "tap": tap }))
        }
        Action::CloseProperty => {
            session.update(|d| d.close_property());
            None
        }
        Action::SetSheetTab { tab } => {
            session.update(|d| d.set_sheet_tab(tab))?;
            None
        }
        Action::ToggleSaved { property_id } => {
            let saved = session.update(|d| d.toggle_saved(property_id))?;
            Some(json!({ "saved": saved }))
        }
        Action::ToggleCompareMode => {
            let active = session.update(|d| d.toggle_compare_mode());
            Some(json!({ "active": active }))
        }
        Action::OpenCompare => {
            let table = session.open_compare()?;
            Some(json!({ "table": table }))
        }
        Action::CloseCompare => {
            session.update(|d| d.close_compare());
            None
        }
        Action::RequestVisit { property_id } => {
            let outcome = session.update(|d| d.request_visit(property_id))?;
            Some(json!({ "outcome": outcome }))
        }
        Action::ScheduleTour => {
            let outcome = session.update(|d| d.schedule_tour())?;
            Some(json!({ "outcome": outcome }))
        }
        Action::SubmitSchedule { date, time } => {
            let pending = session.submit_schedule(&date, &time)?;
            Some(json!({ "pending": pending }))
        }
        Action::CancelSchedule => {
            session.update(|d| d.cancel_schedule());
            None
        }
        Action::PickNewTime { visit_id } => {
            session.update(|d| d.pick_new_time(visit_id))?;
            None
        }
        Action::RealtorResponse { response } => {
            let visit = session.realtor_response(response);
            Some(json!({ "visit": visit }))
        }
        Action::OpenPropertyChat => {
            session.update(|d| d.open_property_chat().map(|_| ()))?;
            None
        }
        Action::AskProperty { text } => {
            let message = session.ask_property(&text)?;
            Some(json!({ "message": message }))
        }
        Action::ClosePropertyChat => {
            session.update(|d| d.close_property_chat());
            None
        }
        Action::SetCalculator {
            down_payment_percent,
            interest_rate_percent,
            loan_term_years,
        } => {
            let breakdown = session.update(|d| {
                d.set_calculator(down_payment_percent, interest_rate_percent, loan_term_years)
            })?;
            Some(json!({ "breakdown": breakdown }))
        }
        Action::NextRoom => {
            session.update(|d| d.next_room())?;
            None
        }
        Action::PreviousRoom => {
            session.update(|d| d.previous_room())?;
            None
        }
        Action::SetViewMode { mode } => {
            session.update(|d| d.set_view_mode(mode));
            None
        }
        Action::ToggleDarkMode => {
            let dark_mode = session.update(|d| d.toggle_dark_mode());
            Some(json!({ "dark_mode": dark_mode }))
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::config::Config;
    use crate::fixtures::Catalog;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<Manager>) {
        let config = Config {
            compare_seed: Some(1),
            ..Config::default()
        };
        let manager = Arc::new(Manager::new(
            Arc::new(Catalog::builtin().unwrap()),
            Arc::new(EventBus::new()),
            &config,
        ));
        (router(manager.clone()), manager)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header("Content-Type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn text(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_check() {
        let (app, _) = app();
        assert_eq!(text(&app, "/health").await, (StatusCode::OK, "OK".to_string()));
    }

    #[tokio::test]
    async fn theme_stylesheet_carries_brand_variables() {
        let (app, _) = app();
        let (status, css) = text(&app, "/brand/theme.css").await;
        assert_eq!(status, StatusCode::OK);
        assert!(css.contains("--brand-primary: #6366F1;"));

        let (_, brand) = send(&app, "GET", "/brand", None).await;
        assert_eq!(brand["brand"]["ai_name"], "Alfred");
        assert_eq!(brand["css_variables"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn mortgage_quote_matches_reference() {
        let (app, _) = app();
        let (status, body) = send(&app, "GET", "/mortgage?price=985000", None).await;
        assert_eq!(status, StatusCode::OK);
        let total = body["breakdown"]["total_monthly"].as_f64().unwrap();
        assert!((total - 5967.20).abs() < 0.01);
        assert_eq!(body["breakdown"]["tier"], "Premium");

        let (status, body) = send(&app, "GET", "/mortgage?rate=0", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_mortgage_input");
        let (status, _) = send(&app, "GET", "/mortgage?price=0", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (app, _) = app();
        let (status, body) = send(&app, "GET", "/sessions/ses_missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown_session");
    }

    #[tokio::test]
    async fn session_lifecycle_over_http() {
        let (app, manager) = app();
        let (status, created) = send(&app, "POST", "/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["dashboard"]["tab"], "chat");
        assert_eq!(created["dashboard"]["dark_mode"], true);
        let id = created["session_id"].as_str().unwrap().to_string();
        assert_eq!(manager.session_count(), 1);

        let actions = format!("/sessions/{}/actions", id);
        let save = json!({ "action": "toggle_saved", "property_id": 2 });
        let (status, body) = send(&app, "POST", &actions, Some(save.clone())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown_property");

        manager.get(&id).unwrap().update(|d| d.run_intake_to_completion());
        let (status, body) = send(&app, "POST", &actions, Some(save)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["saved"], "saved");

        let (status, body) = send(
            &app,
            "POST",
            &actions,
            Some(json!({ "action": "submit_schedule", "date": "2026-03-20", "time": "10:30" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "schedule_form_closed");

        let (status, body) = send(
            &app,
            "POST",
            &actions,
            Some(json!({ "action": "select_property", "property_id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dashboard"]["sheet"]["property"]["id"], 1);

        let (status, body) = send(
            &app,
            "POST",
            &actions,
            Some(json!({
                "action": "set_calculator",
                "down_payment_percent": 20,
                "interest_rate_percent": 6.5,
                "loan_term_years": 15
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["result"]["breakdown"]["monthly_pi"].as_f64().unwrap() > 6000.0);

        let (status, _) = send(&app, "DELETE", &format!("/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn malformed_action_is_rejected() {
        let (app, manager) = app();
        let session = manager.create_session();
        let (status, _) = send(
            &app,
            "POST",
            &format!("/sessions/{}/actions", session.id()),
            Some(json!({ "action": "fly_to_moon" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn realtor_trigger_marks_newest_visit() {
        let (app, manager) = app();
        let session = manager.create_session();
        let (status, body) = send(
            &app,
            "POST",
            &format!("/sessions/{}/actions", session.id()),
            Some(json!({ "action": "realtor_response", "response": "reschedule" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["visit"]["status"], "Reschedule");
        assert_eq!(body["dashboard"]["visits"][0]["label"], "Action Needed");
        assert_eq!(body["dashboard"]["visits"][0]["can_pick_new_time"], true);
    }
}
