//! CRL content API client module.
//!
//! Handles HTTP requests to the events, places and cities endpoints
//! and reshapes the JSON responses.

mod api;
mod cache;
mod client;
mod error;
mod events;
mod legacy;
mod params;

#[allow(clippy::module_name_repetitions)]
pub use api::{ContentApi, LocalContentApi};
pub use cache::{CacheSettings, CachedContentApi};
#[allow(clippy::module_name_repetitions)]
pub use client::{ContentClient, ContentClientBuilder, Endpoints};
#[allow(clippy::module_name_repetitions)]
pub use error::ContentApiError;
pub use events::{normalize_events, parse_timestamp};
pub use legacy::{get_cities, get_events_list, get_place_events, get_places};
pub use params::{ParamValue, QueryParams};
