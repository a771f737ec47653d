//! HTTP server for the VoiceDeck purchase API.
//!
//! Exposes starting a purchase and reading the state of the latest one.

use axum::{
	extract::{DefaultBodyLimit, State},
	http::StatusCode,
	response::Json,
	routing::{get, post},
	Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use voicedeck_config::ApiConfig;
use voicedeck_core::PurchaseOrchestrator;
use voicedeck_types::{APIError, PurchaseRequestBody, PurchaseStateResponse};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Orchestrator running the purchases.
	pub orchestrator: Arc<PurchaseOrchestrator>,
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	orchestrator: Arc<PurchaseOrchestrator>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { orchestrator }, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("VoiceDeck API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Builds the router with the /api base path.
pub fn router(app_state: AppState, api_config: &ApiConfig) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/purchases", post(handle_purchase))
				.route("/purchases/current", get(handle_current_purchase)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(CorsLayer::permissive())
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(app_state)
}

/// Handles POST /api/purchases requests.
///
/// Checks the request and claims the status synchronously, then runs the
/// purchase in the background. Progress is read from
/// `GET /api/purchases/current`.
async fn handle_purchase(
	State(state): State<AppState>,
	Json(body): Json<PurchaseRequestBody>,
) -> Result<(StatusCode, Json<PurchaseStateResponse>), APIError> {
	match crate::apis::purchase::start_purchase(body, &state.orchestrator) {
		Ok(response) => Ok((StatusCode::ACCEPTED, Json(response))),
		Err(e) => {
			tracing::warn!("Purchase request rejected: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/purchases/current requests.
async fn handle_current_purchase(State(state): State<AppState>) -> Json<PurchaseStateResponse> {
	Json(state.orchestrator.current_state())
}
