//! HTTP handler functions for the BridgeAid API.

use actix_web::{HttpRequest, HttpResponse, web};
use bridge_aid_incidents::{IncidentService, SubmitError};
use bridge_aid_server_models::{
    ApiError, ApiHealth, ApiIncidentListing, ApiIncidentTypes, ApiSubmitResponse,
    SubmitReportRequest,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/incidents/types`
pub async fn incident_types() -> HttpResponse {
    HttpResponse::Ok().json(ApiIncidentTypes {
        types: IncidentService::incident_types().to_vec(),
    })
}

/// `POST /api/incidents/report`
///
/// Reports with both `lat` and `lng` skip geocoding; otherwise the
/// address is geocoded.
pub async fn submit_report(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SubmitReportRequest>,
) -> HttpResponse {
    let Some(reporter_id) = req
        .headers()
        .get(state.identity_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    else {
        return HttpResponse::Unauthorized().json(ApiError::new("reporter identity is required"));
    };

    let body = body.into_inner();
    let incident_type = body.incident_type.as_deref().unwrap_or_default();

    let result = match (body.lat, body.lng) {
        (Some(lat), Some(lng)) => state.service.submit_located_report(
            reporter_id,
            incident_type,
            lat,
            lng,
            body.address.as_deref(),
        ),
        _ => {
            state
                .service
                .submit_report(
                    reporter_id,
                    incident_type,
                    body.address.as_deref().unwrap_or_default(),
                )
                .await
        }
    };

    match result {
        Ok(outcome) => HttpResponse::Created().json(ApiSubmitResponse::from(outcome)),
        Err(e @ SubmitError::Input(_)) => {
            log::debug!("Rejected report: {e}");
            HttpResponse::BadRequest().json(ApiError::new(e))
        }
        Err(e @ SubmitError::Duplicate { .. }) => {
            HttpResponse::TooManyRequests().json(ApiError::new(e))
        }
    }
}

/// `GET /api/incidents`
///
/// Runs a verification sweep first, so newly verified incidents show up
/// in the same response.
pub async fn list_incidents(state: web::Data<AppState>) -> HttpResponse {
    let listing = state.service.list_confirmed().await;
    HttpResponse::Ok().json(ApiIncidentListing::from(listing))
}
