use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mela_api::middleware::{require_admin_token, require_auth};
use mela_api::{AppState, AppStateInner, admin, auth, chat, checkins, events, likes, rides, users};
use mela_gateway::connection;
use mela_gateway::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mela=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("MELA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let admin_token =
        std::env::var("MELA_ADMIN_TOKEN").unwrap_or_else(|_| "dev-admin-token-change-me".into());
    let db_path = std::env::var("MELA_DB_PATH").unwrap_or_else(|_| "mela.db".into());
    let host = std::env::var("MELA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MELA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let ai_service_url = std::env::var("MELA_AI_SERVICE_URL").ok();

    // Init database
    let db = Arc::new(mela_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        dispatcher: dispatcher.clone(),
        jwt_secret: jwt_secret.clone(),
        admin_token,
        ai_service_url,
        http: reqwest::Client::new(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/events", get(events::list_events))
        .route("/api/events/trending", get(events::trending_events))
        .route("/api/events/{id}", get(events::get_event))
        .route("/api/chat/{event_id}", get(chat::get_messages))
        .route("/api/checkins/{event_id}", get(checkins::event_checkins));

    let protected_routes = Router::new()
        .route("/api/users/profile", get(users::get_profile).put(users::update_profile))
        .route("/api/events", post(events::create_event))
        .route("/api/events/{id}", put(events::update_event).delete(events::delete_event))
        .route("/api/organizer/my-events", get(events::my_events))
        .route("/api/organizer/analytics/{event_id}", get(events::event_analytics))
        .route("/api/likes/{event_id}", post(likes::toggle_like))
        .route("/api/likes/user/likes", get(likes::liked_event_ids))
        .route("/api/likes/my-likes", get(likes::my_likes))
        .route("/api/checkins/{event_id}", post(checkins::check_in))
        .route("/api/checkins/my-checkins", get(checkins::my_checkins))
        .route("/api/chat/{event_id}", post(chat::send_message))
        .route("/api/rides/rider/register/personal", post(rides::register_personal))
        .route("/api/rides/rider/register/vehicle", post(rides::register_vehicle))
        .route("/api/rides/rider/register/license", post(rides::register_license))
        .route("/api/rides/rider/register/complete", post(rides::register_complete))
        .route("/api/rides/rider/profile", get(rides::rider_profile))
        .route("/api/rides/rider/status", put(rides::update_rider_status))
        .route("/api/rides/rider/active", get(rides::rider_active_rides))
        .route("/api/rides/rider/history", get(rides::rider_history))
        .route("/api/rides/rider/earnings", get(rides::rider_earnings))
        .route("/api/rides/request", post(rides::create_request))
        .route("/api/rides/requests/nearby", get(rides::nearby_requests))
        .route("/api/rides/request/{id}", get(rides::request_detail))
        .route("/api/rides/request/{id}/accept", post(rides::accept_request))
        .route("/api/rides/request/{id}/offer", post(rides::make_offer))
        .route("/api/rides/request/{id}/cancel", post(rides::cancel_request))
        .route("/api/rides/request/{id}/start", post(rides::start_request))
        .route("/api/rides/request/{id}/complete", post(rides::complete_request))
        .route("/api/rides/offer/{id}/accept", post(rides::accept_offer))
        .route("/api/rides/my-rides", get(rides::my_rides))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/admin/organizers/pending", get(admin::pending_organizers))
        .route("/api/admin/organizers/{id}/approve", post(admin::approve_organizer))
        .route("/api/admin/organizers/{id}/reject", post(admin::reject_organizer))
        .route("/api/admin/events/pending", get(admin::pending_events))
        .route("/api/admin/events/approved", get(admin::approved_events))
        .route("/api/admin/events/{id}/approve", post(admin::approve_event))
        .route("/api/admin/events/{id}/reject", post(admin::reject_event))
        .route("/api/admin/events/{id}", delete(admin::delete_event))
        .route("/api/admin/riders/pending", get(admin::pending_riders))
        .route("/api/admin/riders/all", get(admin::all_riders))
        .route("/api/admin/riders/{id}/approve", post(admin::approve_rider))
        .route("/api/admin/riders/{id}/reject", post(admin::reject_rider))
        .route("/api/admin/licenses/pending", get(admin::pending_licenses))
        .route("/api/admin/licenses/{id}/approve", post(admin::approve_license))
        .route("/api/admin/licenses/{id}/reject", post(admin::reject_license))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin_token));

    let ws_route = Router::new().route("/ws", get(ws_upgrade));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("mela server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.dispatcher.clone(),
            state.db.clone(),
            state.jwt_secret.clone(),
        )
    })
}
