//! API client library for the CRL content API.
//!
//! Provides a typed client for the event, place and city endpoints,
//! event date normalization, a TTL cache layer, and adapters that
//! return the legacy in-band error shapes.

/// CRL content API client.
pub mod content;
