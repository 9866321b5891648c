#![allow(dead_code)]

use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use weather_forecast::config::{
    Config, DatasetConfig, OpenWeatherConfig, ServerConfig, TrainingConfig,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn test_config(base_url: &str, dataset: &Path, cache_models: bool) -> Config {
    Config {
        server: ServerConfig::default(),
        openweather: OpenWeatherConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            timeout_seconds: 5,
        },
        dataset: DatasetConfig {
            path: dataset.to_path_buf(),
        },
        training: TrainingConfig {
            n_estimators: 10,
            cache_models,
            ..TrainingConfig::default()
        },
    }
}

pub fn missing_dataset_path() -> PathBuf {
    PathBuf::from("/nonexistent/weather-forecast/weather.csv")
}

/// A small dataset where humid, low-pressure days are followed by rain.
pub fn write_dataset() -> NamedTempFile {
    let mut content =
        String::from("MinTemp,MaxTemp,Temp,Humidity,Pressure,WindGustSpeed,RainTomorrow\n");
    for day in 0..48 {
        let rain = day % 2 == 1;
        let min = 8.0 + (day % 8) as f64;
        let max = min + 7.0 + (day % 3) as f64;
        content.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            min,
            max,
            max - 2.0,
            if rain { 85 + day % 10 } else { 35 + day % 10 },
            if rain { 1004 - day % 4 } else { 1021 + day % 4 },
            30 + day % 11,
            if rain { "Yes" } else { "No" }
        ));
    }

    write_csv(&content)
}

pub fn write_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write dataset");
    file
}

pub async fn mount_weather(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coord": {"lon": 2.35, "lat": 48.85},
            "weather": [{"description": "light rain"}],
            "main": {"temp": 12.0, "feels_like": 11.0, "temp_min": 10.0, "temp_max": 13.0,
                     "pressure": 1003, "humidity": 90},
            "visibility": 800,
            "wind": {"speed": 6.0, "deg": 200},
            "clouds": {"all": 100},
            "timezone": 0,
            "sys": {"country": "FR", "sunrise": 0, "sunset": 0},
            "name": "Paris"
        })))
        .mount(server)
        .await;
}

pub async fn mount_air_quality(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/air_pollution"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{"main": {"aqi": 4}, "components": {"pm2_5": 40.2, "pm10": 55.8, "no2": 61.0}}]
        })))
        .mount(server)
        .await;
}
