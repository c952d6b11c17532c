//! Open-Meteo client tests against a mock server.

use homehub_net::{HttpClient, NetworkError, OpenMeteoClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OpenMeteoClient {
    let http = HttpClient::new().expect("Failed to build client");
    OpenMeteoClient::with_base_url(http, server.uri())
}

#[tokio::test]
async fn test_current_conditions_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "52.370495"))
        .and(query_param("longitude", "4.633083"))
        .and(query_param("current", "temperature_2m,weather_code"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"latitude":52.37,"longitude":4.63,"current":{"time":"2024-01-01T12:00","interval":900,"temperature_2m":7.4,"weather_code":3}}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let conditions = client_for(&server)
        .current(52.370495, 4.633083)
        .await
        .expect("conditions");

    assert_eq!(conditions.temperature_c, 7.4);
    assert_eq!(conditions.weather_code, 3);
    assert_eq!(conditions.symbol(), "cloud");
}

#[tokio::test]
async fn test_server_error_maps_to_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client_for(&server).current(0.0, 0.0).await.unwrap_err();
    assert_eq!(
        err,
        NetworkError::HttpStatus {
            status: 503,
            message: Some("busy".to_string())
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_missing_current_block_is_invalid_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"latitude":0.0}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).current(0.0, 0.0).await.unwrap_err();
    assert!(matches!(err, NetworkError::InvalidBody(_)));
}

#[tokio::test]
async fn test_malformed_json_is_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = client_for(&server).current(0.0, 0.0).await.unwrap_err();
    assert!(matches!(err, NetworkError::Json(_)));
}
