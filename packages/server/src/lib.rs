#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for BridgeAid incident reporting.
//!
//! Serves the REST API for submitting disaster reports and listing
//! confirmed incidents. The reporter identity is read from a trusted
//! header set by an upstream identity service. All state lives in memory
//! and is lost on restart.

pub mod config;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use bridge_aid_ai::Verifier;
use bridge_aid_ai::verify::{DisabledVerifier, verifier_from_env};
use bridge_aid_geocoder::nominatim::NominatimGeocoder;
use bridge_aid_geocoder::{GeocodeCache, GeocodeError};
use bridge_aid_incidents::IncidentService;
use bridge_aid_incidents::service::GeocodingLocale;
use thiserror::Error;

use crate::config::{ConfigError, ServerConfig};

/// Shared application state.
pub struct AppState {
    /// Ingestion, confirmation and verification.
    pub service: Arc<IncidentService>,
    /// Request header carrying the reporter identity.
    pub identity_header: String,
}

/// Failure starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The geocoding client could not be built.
    #[error(transparent)]
    Geocoder(#[from] GeocodeError),

    /// Binding or serving failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/incidents/types", web::get().to(handlers::incident_types))
            .route("/incidents/report", web::post().to(handlers::submit_report))
            .route("/incidents", web::get().to(handlers::list_incidents)),
    );
}

/// Builds the incident service from config, wiring the Nominatim geocoder
/// and whichever verification provider the environment selects.
///
/// # Errors
///
/// Returns [`ServerError::Geocoder`] if the HTTP client cannot be built.
pub fn build_service(config: &ServerConfig) -> Result<IncidentService, ServerError> {
    let geocoder = NominatimGeocoder::new(&config.geocoder)?;
    let cache = GeocodeCache::new(Arc::new(geocoder), &config.geocoder);

    let verifier: Arc<dyn Verifier> =
        match verifier_from_env(config.incidents.verification_window_hours) {
            Ok(verifier) => Arc::from(verifier),
            Err(e) => {
                log::warn!("Verification disabled: {e}");
                Arc::new(DisabledVerifier)
            }
        };

    Ok(
        IncidentService::new(config.incidents.clone(), cache, verifier).with_locale(
            GeocodingLocale {
                region_bias: config.geocoder.region_bias.clone(),
                language: config.geocoder.language.clone(),
            },
        ),
    )
}

/// Starts the BridgeAid API server.
///
/// Loads configuration, builds the incident service, and starts the
/// Actix-Web HTTP server. The caller is responsible for providing the
/// async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if configuration fails to load, the geocoding
/// client cannot be built, or the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), ServerError> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::load()?;
    let service = build_service(&config)?;

    let state = web::Data::new(AppState {
        service: Arc::new(service),
        identity_header: config.identity_header.clone(),
    });

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
