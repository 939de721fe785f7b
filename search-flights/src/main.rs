//! Search Flights Lambda - Handles POST /search-flights.
//!
//! Validates a flight search request, queries Amadeus flight offers and
//! returns them as JSON. Every response goes through the shared CORS wrapper.

mod handler;

use lambda_http::{run, service_fn, Error, Request};
use shared::{Config, Cors};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use handler::AppState;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::load().map_err(|e| {
        error!(error = %e, "refusing to start");
        e
    })?;

    let cors = Cors::from_config(&config);
    let state = Arc::new(AppState::from_config(config));

    info!("search-flights ready");

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        let cors = cors.clone();
        async move {
            cors.handle(event, |event| handler::search_flights(&state, event))
                .await
        }
    }))
    .await
}
