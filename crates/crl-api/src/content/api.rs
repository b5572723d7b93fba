//! `ContentApi` trait definition.
#![allow(clippy::future_not_send)]

use serde_json::Value;

use super::error::ContentApiError;
use super::params::QueryParams;

/// CRL content API trait.
///
/// Abstracts API operations for the cache layer and for mock substitution
/// in tests. Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(ContentApi: Send)]
pub trait LocalContentApi {
    /// Fetches the events of a single place.
    ///
    /// No timeout is applied and the HTTP status is not checked.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not JSON.
    async fn place_events(&self, place_id: &str) -> Result<Value, ContentApiError>;

    /// Fetches the city list.
    ///
    /// `ttl` is a caching hint in seconds (`0` = cache default); the plain
    /// client ignores it.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, error status, transport or decode failure.
    async fn cities(
        &self,
        params: &QueryParams,
        referer: Option<&str>,
        ttl: u64,
    ) -> Result<Value, ContentApiError>;

    /// Fetches the place list.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, error status, transport or decode failure.
    async fn places(
        &self,
        params: &QueryParams,
        referer: Option<&str>,
    ) -> Result<Value, ContentApiError>;

    /// Fetches the event list with normalized dates and flattened places.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, error status, transport or decode
    /// failure, or when an event date cannot be parsed.
    async fn events_list(
        &self,
        params: &QueryParams,
        referer: Option<&str>,
    ) -> Result<Value, ContentApiError>;
}
