use crate::error::Result;
use crate::fetcher::round_whole;
use crate::models::{AirQuality, CurrentConditions, FeatureVector, ForecastPoint, ForecastReport};
use crate::trainer::{Predictions, TrainedModels};
use chrono::{DateTime, Duration, FixedOffset};

pub const FORECAST_STEPS: i64 = 5;

const WARMING_STEP: f64 = 0.3;
const COOLING_STEP: f64 = 0.2;
const RAIN_THRESHOLD: f64 = 0.5;

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Linear walk from the current temperature: up 0.3°C per hour when the
/// model expects warming, otherwise down 0.2°C per hour.
pub fn project_temperatures(current: i64, predicted: f64) -> Vec<f64> {
    let base = current as f64;
    let warming = predicted > base;

    (1..=FORECAST_STEPS)
        .map(|i| {
            let step = i as f64;
            if warming {
                round_tenth(base + step * WARMING_STEP)
            } else {
                round_tenth(base - step * COOLING_STEP)
            }
        })
        .collect()
}

/// Even steps from the current humidity to the predicted one, clamped to
/// 0..=100 percent.
pub fn project_humidity(current: i64, predicted: f64) -> Vec<i64> {
    let base = current as f64;
    let steps = FORECAST_STEPS as f64;

    (1..=FORECAST_STEPS)
        .map(|i| round_whole(base + i as f64 * (predicted - base) / steps).clamp(0, 100))
        .collect()
}

/// "Yes" only when the probability is strictly above one half.
pub fn rain_verdict(probability: f64) -> &'static str {
    if probability > RAIN_THRESHOLD {
        "Yes"
    } else {
        "No"
    }
}

pub fn format_probability(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

pub fn format_visibility(meters: i64) -> String {
    if meters >= 1000 {
        format!("{:.1} km", meters as f64 / 1000.0)
    } else {
        format!("{} m", meters)
    }
}

pub fn future_times(now: DateTime<FixedOffset>) -> Vec<String> {
    (1..=FORECAST_STEPS)
        .map(|i| (now + Duration::hours(i)).format("%H:%M").to_string())
        .collect()
}

pub fn compose(
    location: &str,
    current: &CurrentConditions,
    air_quality: Option<AirQuality>,
    predictions: &Predictions,
) -> ForecastReport {
    let temperatures = project_temperatures(current.current_temp, predictions.temperature);
    let humidities = project_humidity(current.humidity, predictions.humidity);
    let times = future_times(current.local_time);

    let forecast = times
        .into_iter()
        .zip(temperatures)
        .zip(humidities)
        .map(|((time, temperature), humidity)| ForecastPoint {
            time,
            temperature,
            humidity,
        })
        .collect();

    ForecastReport {
        location: location.to_string(),
        city: current.city.clone(),
        country: current.country.clone(),
        current_temp: current.current_temp,
        feels_like: current.feels_like,
        humidity: current.humidity,
        pressure: current.pressure,
        wind: current.wind_speed,
        clouds: current.clouds,
        visibility: format_visibility(current.visibility),
        description: current.description.clone(),
        time: current.local_time.format("%I:%M %p").to_string(),
        date: current.local_time.format("%B %d, %Y").to_string(),
        is_daytime: current.is_daytime,
        forecast,
        rain_prediction: rain_verdict(predictions.rain_probability).to_string(),
        rain_probability: format_probability(predictions.rain_probability),
        air_quality,
        min_temp: current.temp_min,
        max_temp: current.temp_max,
    }
}

/// Run the models on the live conditions and build the report.
pub fn forecast(
    location: &str,
    current: &CurrentConditions,
    air_quality: Option<AirQuality>,
    models: &TrainedModels,
) -> Result<ForecastReport> {
    let predictions = models.predict(&FeatureVector::from_conditions(current))?;
    Ok(compose(location, current, air_quality, &predictions))
}
