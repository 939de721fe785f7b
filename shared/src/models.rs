//! Shared data models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

pub const DEFAULT_ADULTS: u32 = 1;
pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const CURRENCY_CODE: &str = "USD";

/// Flight search request payload.
///
/// Required fields are optional here so that a missing field produces a
/// descriptive 400 instead of a generic parse error.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<String>,
    pub return_date: Option<String>,
    #[validate(range(min = 1, max = 9))]
    pub adults: Option<u32>,
    pub non_stop: Option<bool>,
    #[validate(range(min = 1.0))]
    pub max_price: Option<f64>,
    #[validate(range(min = 1, max = 250))]
    pub max_results: Option<u32>,
}

impl SearchRequest {
    /// Names of required parameters that are absent or blank.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("origin", &self.origin),
            ("destination", &self.destination),
            ("departureDate", &self.departure_date),
        ]
        .into_iter()
        .filter(|(_, value)| is_blank(value))
        .map(|(name, _)| name)
        .collect()
    }

    /// Build the upstream query, applying defaults.
    ///
    /// Returns `None` if a required parameter is missing.
    pub fn to_query(&self) -> Option<FlightOffersQuery> {
        if !self.missing_required().is_empty() {
            return None;
        }

        Some(FlightOffersQuery {
            origin_location_code: self.origin.clone()?,
            destination_location_code: self.destination.clone()?,
            departure_date: self.departure_date.clone()?,
            return_date: self.return_date.clone().filter(|d| !d.trim().is_empty()),
            adults: self.adults.unwrap_or(DEFAULT_ADULTS),
            non_stop: self.non_stop.unwrap_or(false),
            max_price: self.max_price.map(|p| p.floor() as u64),
            max: self.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            currency_code: CURRENCY_CODE.to_string(),
        })
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Query parameters for the flight offers search resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffersQuery {
    pub origin_location_code: String,
    pub destination_location_code: String,
    pub departure_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    pub adults: u32,
    pub non_stop: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u64>,
    pub max: u32,
    pub currency_code: String,
}

/// Flight offers search result from Amadeus.
///
/// Offers are passed through untouched, so they stay as raw JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightOffersResponse {
    pub data: Option<Vec<Value>>,
    pub meta: Option<Map<String, Value>>,
    pub dictionaries: Option<Value>,
}

/// Flight search response payload.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<Value>,
    pub meta: Map<String, Value>,
}

impl From<FlightOffersResponse> for SearchResponse {
    fn from(offers: FlightOffersResponse) -> Self {
        Self {
            success: true,
            message: "Flight search successful".to_string(),
            data: offers.data.unwrap_or_default(),
            meta: offers.meta.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_required() {
        let request: SearchRequest =
            serde_json::from_value(json!({ "origin": "JFK", "destination": "  " })).unwrap();
        assert_eq!(request.missing_required(), vec!["destination", "departureDate"]);
        assert!(request.to_query().is_none());
    }

    #[test]
    fn test_query_defaults() {
        let request: SearchRequest = serde_json::from_value(json!({
            "origin": "JFK",
            "destination": "LAX",
            "departureDate": "2026-11-01"
        }))
        .unwrap();

        let query = request.to_query().unwrap();
        assert_eq!(query.adults, 1);
        assert!(!query.non_stop);
        assert_eq!(query.max, 10);
        assert_eq!(query.max_price, None);
        assert_eq!(query.return_date, None);
        assert_eq!(query.currency_code, "USD");
    }

    #[test]
    fn test_query_serialization() {
        let request: SearchRequest = serde_json::from_value(json!({
            "origin": "JFK",
            "destination": "LHR",
            "departureDate": "2026-11-01",
            "returnDate": "2026-11-08",
            "adults": 2,
            "nonStop": true,
            "maxPrice": 750.5,
            "maxResults": 5
        }))
        .unwrap();

        let value = serde_json::to_value(request.to_query().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "originLocationCode": "JFK",
                "destinationLocationCode": "LHR",
                "departureDate": "2026-11-01",
                "returnDate": "2026-11-08",
                "adults": 2,
                "nonStop": true,
                "maxPrice": 750,
                "max": 5,
                "currencyCode": "USD"
            })
        );
    }

    #[test]
    fn test_blank_return_date_is_omitted() {
        let request: SearchRequest = serde_json::from_value(json!({
            "origin": "JFK",
            "destination": "LAX",
            "departureDate": "2026-11-01",
            "returnDate": ""
        }))
        .unwrap();

        let value = serde_json::to_value(request.to_query().unwrap()).unwrap();
        assert!(value.get("returnDate").is_none());
    }

    #[test]
    fn test_range_validation() {
        let request: SearchRequest = serde_json::from_value(json!({
            "origin": "JFK",
            "destination": "LAX",
            "departureDate": "2026-11-01",
            "adults": 0,
            "maxResults": 500
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_search_response_defaults() {
        let response = SearchResponse::from(FlightOffersResponse::default());
        assert!(response.success);
        assert!(response.data.is_empty());
        assert!(response.meta.is_empty());
    }
}
