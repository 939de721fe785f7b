//! Flight search request handling.

use lambda_http::http::Method;
use lambda_http::{Body, Request, Response};
use serde_json::json;
use shared::http::{error_response, json_response, parse_json_body, ErrorBody};
use shared::{
    resolve_credentials, AmadeusClient, AmadeusError, ClientProvider, Config, EnvCredentials,
    FlightOffersSearch, Result, SearchRequest, SearchResponse,
};
use tracing::{error, info, warn};
use validator::Validate;

const UPSTREAM_ERROR: &str = "Failed to fetch flight data";

/// State shared across invocations of a warm Lambda.
pub struct AppState<C> {
    pub provider: ClientProvider<C>,
    /// Include upstream diagnostics in error responses.
    pub development: bool,
}

impl AppState<AmadeusClient> {
    /// Credentials come from the environment first, then the loaded config.
    pub fn from_config(config: Config) -> Self {
        let development = config.is_development();

        let provider = ClientProvider::new(move || {
            let credentials = resolve_credentials(&[&EnvCredentials, &config])?;
            AmadeusClient::new(&credentials)
        });

        Self {
            provider,
            development,
        }
    }
}

pub async fn search_flights<C: FlightOffersSearch>(
    state: &AppState<C>,
    event: Request,
) -> Result<Option<Response<Body>>> {
    info!(method = %event.method(), path = event.uri().path(), "search-flights request");

    if *event.method() != Method::POST {
        warn!(method = %event.method(), "Method not allowed");
        let body = ErrorBody {
            allowed: Some(vec!["POST".to_string()]),
            ..ErrorBody::new("Method Not Allowed")
        };
        return json_response(405, &body).map(Some);
    }

    let client = state.provider.get().await?;

    let request: SearchRequest = match parse_json_body(event.body()) {
        Ok(request) => request,
        Err(e) => return error_response(e.status_code(), e.to_string()).map(Some),
    };

    let Some(query) = request.to_query() else {
        let missing = request.missing_required().join(", ");
        return error_response(400, format!("Missing required parameters: {}", missing)).map(Some);
    };

    if let Err(e) = request.validate() {
        return error_response(400, format!("Invalid search parameters: {}", e)).map(Some);
    }

    info!(
        origin = %query.origin_location_code,
        destination = %query.destination_location_code,
        departure_date = %query.departure_date,
        return_date = ?query.return_date,
        "Searching flights"
    );

    match client.flight_offers_search(&query).await {
        Ok(offers) => {
            info!(
                offers = offers.data.as_ref().map_or(0, Vec::len),
                "Received response from Amadeus API"
            );
            json_response(200, &SearchResponse::from(offers)).map(Some)
        }
        Err(e) => {
            error!(
                error = %e,
                status = ?e.status,
                description = ?e.description,
                "Amadeus API error"
            );
            upstream_error_response(&e, state.development).map(Some)
        }
    }
}

/// Shape an upstream failure, passing its status through.
fn upstream_error_response(err: &AmadeusError, development: bool) -> Result<Response<Body>> {
    let details = development.then(|| {
        json!({
            "message": err.message,
            "code": err.code(),
            "statusCode": err.status,
            "body": err.body,
            "description": err.description,
            "stack": format!("{:?}", err),
        })
    });

    let body = ErrorBody {
        message: Some(err.description.clone().unwrap_or_else(|| err.message.clone())),
        details,
        ..ErrorBody::new(UPSTREAM_ERROR)
    };

    json_response(err.status.unwrap_or(500), &body)
}
