use crate::config::OpenWeatherConfig;
use crate::error::{AppError, Result};
use crate::models::{AirQuality, AqiLevel, CurrentConditions, Pollutants};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_PRESSURE: f64 = 1013.0;
const DEFAULT_VISIBILITY: f64 = 10_000.0;

static AQI_LEVELS: [AqiLevel; 5] = [
    AqiLevel {
        text: "Excellent",
        description: "The air is clean and healthy.",
        color: "#4CAF50",
        icon: "emoji-smile",
    },
    AqiLevel {
        text: "Good",
        description: "Satisfactory air quality.",
        color: "#8BC34A",
        icon: "emoji-neutral",
    },
    AqiLevel {
        text: "Moderate",
        description: "Acceptable quality with some pollutants.",
        color: "#FFC107",
        icon: "emoji-expressionless",
    },
    AqiLevel {
        text: "Poor",
        description: "Possible effects on sensitive people.",
        color: "#FF9800",
        icon: "emoji-frown",
    },
    AqiLevel {
        text: "Very Poor",
        description: "Health risk.",
        color: "#F44336",
        icon: "emoji-dizzy",
    },
];

static UNKNOWN_AQI: AqiLevel = AqiLevel {
    text: "Unknown",
    description: "Data not available",
    color: "#9E9E9E",
    icon: "question-circle",
};

/// Client for the current-weather and air-pollution endpoints.
pub struct Fetcher {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Fetcher {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent("weather-forecast/0.1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &OpenWeatherConfig) -> Result<Self> {
        Self::new(&config.base_url, &config.api_key, config.timeout())
    }

    /// Current conditions for `city`, or `None` when the city is unknown or
    /// the request fails for any reason.
    pub async fn current_weather(&self, city: &str) -> Option<CurrentConditions> {
        match self.fetch_current(city).await {
            Ok(Some(conditions)) => Some(conditions),
            Ok(None) => {
                info!("City '{}' not found by weather API", city);
                None
            }
            Err(e) => {
                warn!("Weather API error for '{}': {}", city, e);
                None
            }
        }
    }

    /// Air quality at the given coordinates. No request is made unless both
    /// coordinates are present.
    pub async fn air_quality(&self, lat: Option<f64>, lon: Option<f64>) -> Option<AirQuality> {
        let (lat, lon) = match (lat, lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                debug!("Skipping air quality lookup, coordinates unavailable");
                return None;
            }
        };

        match self.fetch_air_quality(lat, lon).await {
            Ok(air) => Some(air),
            Err(e) => {
                warn!("Air quality API error at ({}, {}): {}", lat, lon, e);
                None
            }
        }
    }

    async fn fetch_current(&self, city: &str) -> Result<Option<CurrentConditions>> {
        let url = format!("{}/weather", self.base_url);
        debug!("Fetching current weather for '{}'", city);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(without_url)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .error_for_status()
            .map_err(without_url)?
            .text()
            .await
            .map_err(without_url)?;

        let raw: OwCurrentResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("Invalid current weather JSON: {}", e)))?;

        Ok(Some(normalize_current(raw, Utc::now())))
    }

    async fn fetch_air_quality(&self, lat: f64, lon: f64) -> Result<AirQuality> {
        let url = format!("{}/air_pollution", self.base_url);
        debug!("Fetching air quality for ({}, {})", lat, lon);

        let body = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(without_url)?
            .text()
            .await
            .map_err(without_url)?;

        let raw: OwAirResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("Invalid air pollution JSON: {}", e)))?;

        normalize_air_quality(raw)
    }
}

/// The request URL carries the API key, so it is stripped before the error
/// can reach a log line.
fn without_url(e: reqwest::Error) -> AppError {
    AppError::Http(e.without_url())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwWind {
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwClouds {
    all: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwWeather {
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwSys {
    country: Option<String>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwCoord {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwCurrentResponse {
    name: Option<String>,
    timezone: Option<i64>,
    visibility: Option<f64>,
    main: OwMain,
    wind: OwWind,
    clouds: OwClouds,
    weather: Vec<OwWeather>,
    sys: OwSys,
    coord: OwCoord,
}

#[derive(Debug, Deserialize)]
struct OwAirMain {
    aqi: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwComponents {
    pm2_5: Option<f64>,
    pm10: Option<f64>,
    no2: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwAirEntry {
    main: OwAirMain,
    #[serde(default)]
    components: OwComponents,
}

#[derive(Debug, Deserialize)]
struct OwAirResponse {
    #[serde(default)]
    list: Vec<OwAirEntry>,
}

/// Round half to even, matching how the upstream values have always been
/// displayed.
pub(crate) fn round_whole(value: f64) -> i64 {
    value.round_ties_even() as i64
}

fn utc_offset(seconds: i64) -> FixedOffset {
    i32::try_from(seconds)
        .ok()
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

fn epoch(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// Daytime is the half-open interval `[sunrise, sunset)`.
pub fn is_daytime(now: DateTime<Utc>, sunrise: DateTime<Utc>, sunset: DateTime<Utc>) -> bool {
    sunrise <= now && now < sunset
}

/// Only "clear sky" is rewritten; every other description passes through.
pub fn describe(description: &str, is_daytime: bool) -> String {
    match description {
        "clear sky" if is_daytime => "sunny".to_string(),
        "clear sky" => "clear night".to_string(),
        other => other.to_string(),
    }
}

fn normalize_current(raw: OwCurrentResponse, now: DateTime<Utc>) -> CurrentConditions {
    let offset = utc_offset(raw.timezone.unwrap_or(0));
    let sunrise = epoch(raw.sys.sunrise.unwrap_or(0));
    let sunset = epoch(raw.sys.sunset.unwrap_or(0));
    let daytime = is_daytime(now, sunrise, sunset);

    let description = raw
        .weather
        .into_iter()
        .next()
        .and_then(|w| w.description)
        .unwrap_or_else(|| "unknown".to_string());

    let temp = raw.main.temp.unwrap_or(0.0);

    CurrentConditions {
        city: raw.name.unwrap_or_else(|| "Unknown".to_string()),
        country: raw.sys.country.unwrap_or_default(),
        current_temp: round_whole(temp),
        feels_like: round_whole(raw.main.feels_like.unwrap_or(temp)),
        temp_min: round_whole(raw.main.temp_min.unwrap_or(0.0)),
        temp_max: round_whole(raw.main.temp_max.unwrap_or(0.0)),
        humidity: round_whole(raw.main.humidity.unwrap_or(0.0)),
        pressure: round_whole(raw.main.pressure.unwrap_or(DEFAULT_PRESSURE)),
        wind_speed: raw.wind.speed.unwrap_or(0.0),
        wind_deg: raw.wind.deg.unwrap_or(0.0),
        clouds: round_whole(raw.clouds.all.unwrap_or(0.0)),
        visibility: round_whole(raw.visibility.unwrap_or(DEFAULT_VISIBILITY)),
        description: describe(&description, daytime),
        is_daytime: daytime,
        local_time: now.with_timezone(&offset),
        lat: raw.coord.lat,
        lon: raw.coord.lon,
    }
}

/// Qualitative level for an index; anything outside 1..=5 is unknown.
pub fn aqi_level(index: i64) -> &'static AqiLevel {
    usize::try_from(index)
        .ok()
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| AQI_LEVELS.get(i))
        .unwrap_or(&UNKNOWN_AQI)
}

fn normalize_air_quality(raw: OwAirResponse) -> Result<AirQuality> {
    let entry = raw
        .list
        .into_iter()
        .next()
        .ok_or_else(|| AppError::InvalidData("Air pollution response has no entries".to_string()))?;

    let components = entry.components;

    Ok(AirQuality {
        aqi: entry.main.aqi,
        level: *aqi_level(entry.main.aqi),
        pollutants: Pollutants {
            pm2_5: round_whole(components.pm2_5.unwrap_or(0.0)),
            pm10: round_whole(components.pm10.unwrap_or(0.0)),
            no2: round_whole(components.no2.unwrap_or(0.0)),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(json: &str) -> OwCurrentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_describe_clear_sky() {
        assert_eq!(describe("clear sky", true), "sunny");
        assert_eq!(describe("clear sky", false), "clear night");
        assert_eq!(describe("light rain", true), "light rain");
        assert_eq!(describe("Clear sky", false), "Clear sky");
    }

    #[test]
    fn test_is_daytime_is_half_open() {
        let sunrise = Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap();
        let sunset = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();

        assert!(is_daytime(sunrise, sunrise, sunset));
        assert!(is_daytime(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            sunrise,
            sunset
        ));
        assert!(!is_daytime(sunset, sunrise, sunset));
        assert!(!is_daytime(
            Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap(),
            sunrise,
            sunset
        ));
    }

    #[test]
    fn test_normalize_current_full_payload() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let raw = parse(
            r#"{
                "name": "Paris",
                "timezone": 7200,
                "visibility": 8000,
                "coord": {"lat": 48.85, "lon": 2.35},
                "main": {"temp": 21.5, "feels_like": 20.4, "temp_min": 18.7, "temp_max": 24.1,
                         "humidity": 55, "pressure": 1016},
                "wind": {"speed": 3.6, "deg": 250},
                "clouds": {"all": 0},
                "weather": [{"description": "clear sky"}],
                "sys": {"country": "FR", "sunrise": 1717212000, "sunset": 1717270000}
            }"#,
        );

        let c = normalize_current(raw, now);
        assert_eq!(c.city, "Paris");
        assert_eq!(c.country, "FR");
        assert_eq!(c.current_temp, 22);
        assert_eq!(c.feels_like, 20);
        assert_eq!(c.temp_min, 19);
        assert_eq!(c.temp_max, 24);
        assert_eq!(c.humidity, 55);
        assert_eq!(c.pressure, 1016);
        assert_eq!(c.visibility, 8000);
        assert!(c.is_daytime);
        assert_eq!(c.description, "sunny");
        assert_eq!(c.local_time.format("%H:%M").to_string(), "14:00");
        assert_eq!(c.lat, Some(48.85));
        assert_eq!(c.lon, Some(2.35));
    }

    #[test]
    fn test_normalize_current_defaults_missing_fields() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let c = normalize_current(parse("{}"), now);

        assert_eq!(c.city, "Unknown");
        assert_eq!(c.country, "");
        assert_eq!(c.current_temp, 0);
        assert_eq!(c.pressure, 1013);
        assert_eq!(c.visibility, 10_000);
        assert_eq!(c.description, "unknown");
        // sunrise and sunset both default to the epoch, so it is never day
        assert!(!c.is_daytime);
        assert_eq!(c.local_time.offset().local_minus_utc(), 0);
        assert_eq!(c.lat, None);
    }

    #[test]
    fn test_feels_like_falls_back_to_temp() {
        let now = Utc::now();
        let c = normalize_current(parse(r#"{"main": {"temp": 7.2}}"#), now);
        assert_eq!(c.feels_like, 7);
    }

    #[test]
    fn test_temperatures_round_half_to_even() {
        assert_eq!(round_whole(2.5), 2);
        assert_eq!(round_whole(3.5), 4);
        assert_eq!(round_whole(-0.5), 0);
        assert_eq!(round_whole(12.51), 13);
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        assert_eq!(utc_offset(200_000).local_minus_utc(), 0);
        assert_eq!(utc_offset(-18_000).local_minus_utc(), -18_000);
    }

    #[test]
    fn test_aqi_levels() {
        assert_eq!(aqi_level(1).text, "Excellent");
        assert_eq!(aqi_level(5).color, "#F44336");

        for index in [0, 6, -1, 42] {
            let level = aqi_level(index);
            assert_eq!(level.text, "Unknown");
            assert_eq!(level.color, "#9E9E9E");
            assert_eq!(level.icon, "question-circle");
        }
    }

    #[test]
    fn test_normalize_air_quality() {
        let raw: OwAirResponse = serde_json::from_str(
            r#"{"list": [{"main": {"aqi": 3},
                          "components": {"pm2_5": 12.5, "pm10": 20.7, "no2": 33.2, "o3": 60.1}}]}"#,
        )
        .unwrap();

        let air = normalize_air_quality(raw).unwrap();
        assert_eq!(air.aqi, 3);
        assert_eq!(air.level.text, "Moderate");
        assert_eq!(air.pollutants.pm2_5, 12);
        assert_eq!(air.pollutants.pm10, 21);
        assert_eq!(air.pollutants.no2, 33);
    }

    #[test]
    fn test_normalize_air_quality_empty_list() {
        let raw: OwAirResponse = serde_json::from_str(r#"{"list": []}"#).unwrap();
        assert!(normalize_air_quality(raw).is_err());
    }
}
