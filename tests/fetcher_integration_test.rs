use serde_json::json;
use std::time::Duration;
use weather_forecast::fetcher::Fetcher;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(server: &MockServer) -> Fetcher {
    Fetcher::new(&server.uri(), "test-key", Duration::from_secs(2)).expect("Failed to create fetcher")
}

fn paris_body() -> serde_json::Value {
    json!({
        "coord": {"lon": 2.3488, "lat": 48.8534},
        "weather": [{"id": 800, "main": "Clear", "description": "overcast clouds"}],
        "main": {"temp": 14.2, "feels_like": 13.1, "temp_min": 12.6, "temp_max": 15.9,
                 "pressure": 1021, "humidity": 72},
        "visibility": 10000,
        "wind": {"speed": 5.14, "deg": 220},
        "clouds": {"all": 90},
        "timezone": 3600,
        "sys": {"country": "FR", "sunrise": 1700000000, "sunset": 1700030000},
        "name": "Paris"
    })
}

/// Test the current-weather request shape and normalization
#[tokio::test]
async fn test_current_weather_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Paris"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(paris_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let current = fetcher(&mock_server)
        .current_weather("Paris")
        .await
        .expect("Expected current conditions");

    assert_eq!(current.city, "Paris");
    assert_eq!(current.country, "FR");
    assert_eq!(current.current_temp, 14);
    assert_eq!(current.temp_min, 13);
    assert_eq!(current.temp_max, 16);
    assert_eq!(current.humidity, 72);
    assert_eq!(current.pressure, 1021);
    assert_eq!(current.clouds, 90);
    assert_eq!(current.description, "overcast clouds");
    assert_eq!(current.local_time.offset().local_minus_utc(), 3600);
    assert_eq!(current.lat, Some(48.8534));
}

/// Test that a 404 means "not found" rather than an error
#[tokio::test]
async fn test_current_weather_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"cod": "404", "message": "city not found"})),
        )
        .mount(&mock_server)
        .await;

    assert!(fetcher(&mock_server).current_weather("Nowhereville").await.is_none());
}

/// Test that server errors and malformed bodies yield no record
#[tokio::test]
async fn test_current_weather_failures_yield_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&mock_server);
    assert!(fetcher.current_weather("Broken").await.is_none());
    assert!(fetcher.current_weather("Garbled").await.is_none());
}

/// Test that a slow upstream is cut off by the timeout, without retries
#[tokio::test]
async fn test_current_weather_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(paris_body())
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&mock_server.uri(), "test-key", Duration::from_millis(200))
        .expect("Failed to create fetcher");
    assert!(fetcher.current_weather("Paris").await.is_none());
}

/// Test air quality normalization against a mocked endpoint
#[tokio::test]
async fn test_air_quality_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/air_pollution"))
        .and(query_param("lat", "48.85"))
        .and(query_param("lon", "2.35"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coord": {"lon": 2.35, "lat": 48.85},
            "list": [{
                "main": {"aqi": 2},
                "components": {"co": 230.31, "no2": 17.48, "o3": 45.06,
                               "pm2_5": 6.5, "pm10": 9.61},
                "dt": 1700000000
            }]
        })))
        .mount(&mock_server)
        .await;

    let air = fetcher(&mock_server)
        .air_quality(Some(48.85), Some(2.35))
        .await
        .expect("Expected air quality");

    assert_eq!(air.aqi, 2);
    assert_eq!(air.level.text, "Good");
    assert_eq!(air.pollutants.pm2_5, 6);
    assert_eq!(air.pollutants.pm10, 10);
    assert_eq!(air.pollutants.no2, 17);
}

/// Test that out-of-range indices map to the unknown level
#[tokio::test]
async fn test_air_quality_unknown_index() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/air_pollution"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{"main": {"aqi": 9}, "components": {}}]
        })))
        .mount(&mock_server)
        .await;

    let air = fetcher(&mock_server)
        .air_quality(Some(1.0), Some(1.0))
        .await
        .expect("Expected air quality");

    assert_eq!(air.level.text, "Unknown");
    assert_eq!(air.level.color, "#9E9E9E");
    assert_eq!(air.level.icon, "question-circle");
    assert_eq!(air.pollutants.pm2_5, 0);
}

/// Test that missing coordinates skip the network entirely
#[tokio::test]
async fn test_air_quality_without_coordinates_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/air_pollution"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&mock_server);
    assert!(fetcher.air_quality(None, Some(2.35)).await.is_none());
    assert!(fetcher.air_quality(Some(48.85), None).await.is_none());
}

/// Test that an air quality failure yields no record
#[tokio::test]
async fn test_air_quality_failure_yields_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/air_pollution"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    assert!(fetcher(&mock_server)
        .air_quality(Some(48.85), Some(2.35))
        .await
        .is_none());
}
