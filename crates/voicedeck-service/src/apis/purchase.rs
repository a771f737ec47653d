//! Purchase endpoint logic.
//!
//! Converts request bodies into purchase requests, starts the purchase in the
//! background and maps precondition failures onto API errors.

use std::sync::Arc;
use voicedeck_core::{PurchaseError, PurchaseOrchestrator};
use voicedeck_types::{APIError, PurchaseRequest, PurchaseRequestBody, PurchaseStateResponse};

/// Starts a purchase and returns the state right after it was claimed.
///
/// The on-chain part runs on a spawned task, so the caller gets an answer as
/// soon as the preconditions hold.
pub fn start_purchase(
	body: PurchaseRequestBody,
	orchestrator: &Arc<PurchaseOrchestrator>,
) -> Result<PurchaseStateResponse, APIError> {
	let Some(order) = body.order else {
		return Err(purchase_error_to_api(PurchaseError::MissingOrder));
	};
	let buyer = match body.buyer {
		Some(buyer) => buyer,
		None => orchestrator
			.wallet_address(order.chain_id)
			.map_err(purchase_error_to_api)?,
	};

	let request = PurchaseRequest {
		order: Some(order),
		amount: body.amount,
		buyer,
		hypercert_id: body.hypercert_id,
		comment: body.comment,
	};

	let prepared = orchestrator
		.prepare(request)
		.map_err(purchase_error_to_api)?;
	let state = orchestrator.current_state();

	let orchestrator = Arc::clone(orchestrator);
	tokio::spawn(async move {
		let outcome = orchestrator.execute(prepared).await;
		tracing::debug!(confirmed = outcome.is_confirmed(), "Background purchase finished");
	});

	Ok(state)
}

/// Maps a precondition failure to its HTTP error.
pub fn purchase_error_to_api(error: PurchaseError) -> APIError {
	let message = error.to_string();
	match error {
		PurchaseError::MissingOrder => bad_request("MISSING_ORDER", message),
		PurchaseError::InvalidAmount => bad_request("INVALID_AMOUNT", message),
		PurchaseError::PriceOverflow => bad_request("PRICE_OVERFLOW", message),
		PurchaseError::InvalidOrder(_) => bad_request("INVALID_ORDER", message),
		PurchaseError::PurchaseInProgress(_) => APIError::Conflict {
			error_type: "PURCHASE_IN_PROGRESS".to_string(),
			message,
		},
		PurchaseError::NoChainClient(_) => APIError::ServiceUnavailable {
			error_type: "NO_CHAIN_CLIENT".to_string(),
			message,
			retry_after: None,
		},
	}
}

fn bad_request(error_type: &str, message: String) -> APIError {
	APIError::BadRequest {
		error_type: error_type.to_string(),
		message,
		details: None,
	}
}
