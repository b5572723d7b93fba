//! In-band error adapters.
//!
//! Each function runs one typed operation and folds its failure into the
//! JSON shape callers of the content API historically expect:
//! `{"error": ...}` objects, or a one-element list for places.

use serde_json::{Value, json};

use super::api::LocalContentApi;
use super::error::ContentApiError;
use super::params::QueryParams;

/// Error marker for transport timeouts.
const TIMEOUT_MARKER: &str = "timeout";

/// Fetches the events of a place; any failure becomes `{"error": message}`.
pub async fn get_place_events(api: &(impl LocalContentApi + Sync), place_id: &str) -> Value {
    fold_place_events(place_id, api.place_events(place_id).await)
}

/// Fetches the city list.
///
/// Timeouts become `{"error": "timeout"}` and error statuses become
/// `{"error": message}`.
///
/// # Errors
///
/// Transport and decode failures other than timeouts are returned as-is.
pub async fn get_cities(
    api: &(impl LocalContentApi + Sync),
    params: &QueryParams,
    referer: Option<&str>,
    ttl: u64,
) -> Result<Value, ContentApiError> {
    fold_cities(api.cities(params, referer, ttl).await)
}

/// Fetches the place list; any failure becomes `[{"error": message}]`.
pub async fn get_places(
    api: &(impl LocalContentApi + Sync),
    params: &QueryParams,
    referer: Option<&str>,
) -> Value {
    fold_places(api.places(params, referer).await)
}

/// Fetches the normalized event list.
///
/// Timeouts become `{"error": "timeout"}`, any other failure
/// `{"error": message}`.
pub async fn get_events_list(
    api: &(impl LocalContentApi + Sync),
    params: &QueryParams,
    referer: Option<&str>,
) -> Value {
    fold_events_list(api.events_list(params, referer).await)
}

fn error_object(message: &str) -> Value {
    json!({ "error": message })
}

fn fold_place_events(place_id: &str, result: Result<Value, ContentApiError>) -> Value {
    result.unwrap_or_else(|e| {
        tracing::error!(%place_id, error = %e, "Error with getting place events");
        error_object(&e.to_string())
    })
}

fn fold_cities(result: Result<Value, ContentApiError>) -> Result<Value, ContentApiError> {
    match result {
        Ok(body) => Ok(body),
        Err(e) if e.is_timeout() => {
            tracing::error!(error = %e, "Timeout error with getting cities");
            Ok(error_object(TIMEOUT_MARKER))
        }
        Err(e) if e.is_status() => {
            tracing::error!(error = %e, "Error with getting cities");
            Ok(error_object(&e.to_string()))
        }
        Err(e) => {
            tracing::error!(error = %e, "Error with getting cities");
            Err(e)
        }
    }
}

fn fold_places(result: Result<Value, ContentApiError>) -> Value {
    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Error with getting places");
        Value::Array(vec![error_object(&e.to_string())])
    })
}

fn fold_events_list(result: Result<Value, ContentApiError>) -> Value {
    match result {
        Ok(body) => body,
        Err(e) if e.is_timeout() => {
            tracing::error!(error = %e, "Timeout error with getting events");
            error_object(TIMEOUT_MARKER)
        }
        Err(e) => {
            tracing::error!(error = %e, "Error with getting events");
            error_object(&e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use std::time::Duration;

    use tracing::subscriber::with_default;
    use tracing_mock::{expect, subscriber};

    use super::*;
    use crate::content::ContentClient;

    fn timeout_error() -> ContentApiError {
        ContentApiError::Timeout {
            url: String::from("https://api.example.org/v1/events/"),
        }
    }

    fn client_for(mock_server: &wiremock::MockServer) -> ContentClient {
        let api_root = format!("{}/v1/", mock_server.uri());
        ContentClient::builder()
            .api_root(api_root.parse().unwrap())
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap()
    }

    #[test]
    fn test_fold_events_list_timeout_logs_error() {
        // Arrange
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().at_level(tracing::Level::ERROR))
            .only()
            .run_with_handle();

        // Act
        let body = with_default(subscriber, || fold_events_list(Err(timeout_error())));

        // Assert
        handle.assert_finished();
        assert_eq!(body, json!({"error": "timeout"}));
    }

    #[test]
    fn test_fold_cities_timeout_logs_error() {
        // Arrange
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().at_level(tracing::Level::ERROR))
            .only()
            .run_with_handle();

        // Act
        let body = with_default(subscriber, || fold_cities(Err(timeout_error()))).unwrap();

        // Assert
        handle.assert_finished();
        assert_eq!(body, json!({"error": "timeout"}));
    }

    #[test]
    fn test_fold_places_wraps_error_in_list() {
        // Arrange
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().at_level(tracing::Level::ERROR))
            .only()
            .run_with_handle();

        // Act
        let body = with_default(subscriber, || fold_places(Err(timeout_error())));

        // Assert
        handle.assert_finished();
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0]["error"].as_str().unwrap().contains("timed out"));
    }

    #[test]
    fn test_fold_place_events_uses_message() {
        // Arrange
        let err = ContentApiError::Url {
            path: String::from("events/x/"),
            source: url::Url::parse("::").unwrap_err(),
        };

        // Act
        let body = fold_place_events("x", Err(err));

        // Assert
        assert_eq!(body, json!({"error": "failed to join URL path: events/x/"}));
    }

    #[test]
    fn test_fold_passes_success_through() {
        // Arrange
        let ok = json!({"cities": []});

        // Act & Assert
        assert_eq!(fold_cities(Ok(ok.clone())).unwrap(), ok);
        assert_eq!(fold_places(Ok(json!([]))), json!([]));
        assert_eq!(fold_events_list(Ok(ok.clone())), ok);
        assert_eq!(fold_place_events("1", Ok(ok.clone())), ok);
    }

    #[test]
    fn test_fold_cities_propagates_decode_error() {
        // Arrange
        let source = serde_json::from_str::<Value>("nope").unwrap_err();
        let err = ContentApiError::Decode {
            url: String::from("https://api.example.org/v1/cities/"),
            source,
        };
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().at_level(tracing::Level::ERROR))
            .only()
            .run_with_handle();

        // Act
        let result = with_default(subscriber, || fold_cities(Err(err)));

        // Assert
        handle.assert_finished();
        assert!(matches!(result, Err(ContentApiError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_get_cities_error_status_becomes_marker() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let body = get_cities(&client, &QueryParams::new(), None, 0)
            .await
            .unwrap();

        // Assert
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("500"));
    }

    #[tokio::test]
    async fn test_get_events_list_timeout_marker() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string(r#"{"events": []}"#)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let body = get_events_list(&client, &QueryParams::new(), None).await;

        // Assert
        assert_eq!(body, json!({"error": "timeout"}));
    }

    #[tokio::test]
    async fn test_get_places_error_is_single_element_list() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let body = get_places(&client, &QueryParams::new(), None).await;

        // Assert
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0]["error"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_get_places_success_returns_body() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let json_body = include_str!("../../../../fixtures/crl/places.json");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/v1/places/"))
            .and(wiremock::matchers::header("Referer", "https://example.org/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(json_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);

        // Act
        let body = get_places(&client, &QueryParams::new(), Some("https://example.org/")).await;

        // Assert
        assert_eq!(body[0]["slug"], "bolshoi");
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_place_events_connect_error_is_object() {
        // Arrange
        let client = ContentClient::builder()
            .api_root("http://127.0.0.1:1/v1/".parse().unwrap())
            .build()
            .unwrap();

        // Act
        let body = get_place_events(&client, "42").await;

        // Assert
        assert!(body.is_object());
        assert!(body["error"].is_string());
    }
}
