//! Shared library for the route manager Lambda functions.
//!
//! This crate provides configuration, error types, HTTP helpers and the
//! upstream travel API client used by every Lambda function.

pub mod amadeus;
pub mod config;
pub mod cors;
pub mod error;
pub mod http;
pub mod models;
pub mod provider;

pub use amadeus::{AmadeusClient, AmadeusError, ErrorKind, FlightOffersSearch, Hostname};
pub use config::{resolve_credentials, Config, CredentialSource, Credentials, EnvCredentials};
pub use cors::Cors;
pub use error::{Error, Result};
pub use models::{FlightOffersQuery, FlightOffersResponse, SearchRequest, SearchResponse};
pub use provider::ClientProvider;
