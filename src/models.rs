use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Normalized current conditions for one city.
///
/// `temp_min <= current_temp <= temp_max` comes straight from upstream and is
/// not guaranteed.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub city: String,
    pub country: String,
    pub current_temp: i64,
    pub feels_like: i64,
    pub temp_min: i64,
    pub temp_max: i64,
    pub humidity: i64,
    pub pressure: i64,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub clouds: i64,
    /// Meters.
    pub visibility: i64,
    pub description: String,
    pub is_daytime: bool,
    pub local_time: DateTime<FixedOffset>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AqiLevel {
    pub text: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pollutants {
    pub pm2_5: i64,
    pub pm10: i64,
    pub no2: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirQuality {
    pub aqi: i64,
    #[serde(flatten)]
    pub level: AqiLevel,
    pub pollutants: Pollutants,
}

/// One cleaned observation from the historical dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRow {
    pub min_temp: f64,
    pub max_temp: f64,
    pub temp: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_gust_speed: f64,
    pub rain_tomorrow: bool,
    pub temp_range: f64,
    pub is_cold: bool,
}

impl HistoricalRow {
    pub fn new(
        min_temp: f64,
        max_temp: f64,
        temp: f64,
        humidity: f64,
        pressure: f64,
        wind_gust_speed: f64,
        rain_tomorrow: bool,
    ) -> Self {
        Self {
            min_temp,
            max_temp,
            temp,
            humidity,
            pressure,
            wind_gust_speed,
            rain_tomorrow,
            temp_range: max_temp - min_temp,
            is_cold: temp < 10.0,
        }
    }

    pub fn features(&self) -> FeatureVector {
        FeatureVector {
            min_temp: self.min_temp,
            max_temp: self.max_temp,
            humidity: self.humidity,
            pressure: self.pressure,
            wind_gust_speed: self.wind_gust_speed,
            temp_range: self.temp_range,
        }
    }
}

pub const FEATURE_COUNT: usize = 6;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "MinTemp",
    "MaxTemp",
    "Humidity",
    "Pressure",
    "WindGustSpeed",
    "TempRange",
];

/// The six inputs shared by all three models, in `FEATURE_NAMES` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub min_temp: f64,
    pub max_temp: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_gust_speed: f64,
    pub temp_range: f64,
}

impl FeatureVector {
    pub fn from_conditions(current: &CurrentConditions) -> Self {
        Self {
            min_temp: current.temp_min as f64,
            max_temp: current.temp_max as f64,
            humidity: current.humidity as f64,
            pressure: current.pressure as f64,
            wind_gust_speed: current.wind_speed,
            temp_range: (current.temp_max - current.temp_min) as f64,
        }
    }

    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.min_temp,
            self.max_temp,
            self.humidity,
            self.pressure,
            self.wind_gust_speed,
            self.temp_range,
        ]
    }

    /// Name of the first feature that is NaN or infinite, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.to_array()
            .iter()
            .position(|v| !v.is_finite())
            .map(|i| FEATURE_NAMES[i])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub time: String,
    pub temperature: f64,
    pub humidity: i64,
}

/// Everything the view needs for a successful request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub location: String,
    pub city: String,
    pub country: String,
    pub current_temp: i64,
    pub feels_like: i64,
    pub humidity: i64,
    pub pressure: i64,
    pub wind: f64,
    pub clouds: i64,
    pub visibility: String,
    pub description: String,
    pub time: String,
    pub date: String,
    pub is_daytime: bool,
    pub forecast: Vec<ForecastPoint>,
    pub rain_prediction: String,
    pub rain_probability: String,
    pub air_quality: Option<AirQuality>,
    pub min_temp: i64,
    pub max_temp: i64,
}
