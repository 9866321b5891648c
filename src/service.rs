use crate::config::{Config, TrainingConfig};
use crate::dataset::Dataset;
use crate::error::{ForecastError, Result};
use crate::fetcher::Fetcher;
use crate::forecast;
use crate::models::ForecastReport;
use crate::trainer::TrainedModels;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

/// Runs the fetch, load, train and compose stages for one city.
pub struct ForecastService {
    fetcher: Fetcher,
    dataset_path: PathBuf,
    training: TrainingConfig,
    cached_models: OnceCell<Arc<TrainedModels>>,
}

impl ForecastService {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::from_config(&config.openweather)?,
            dataset_path: config.dataset.path.clone(),
            training: config.training,
            cached_models: OnceCell::new(),
        })
    }

    pub async fn forecast(&self, city: &str) -> std::result::Result<ForecastReport, ForecastError> {
        // Validate input before any network call
        let city = city.trim();
        if city.is_empty() {
            return Err(ForecastError::EmptyCity);
        }

        // Fetch current conditions
        let current = match self.fetcher.current_weather(city).await {
            Some(current) => current,
            None => {
                warn!("No current conditions for '{}'", city);
                return Err(ForecastError::CityNotFound);
            }
        };

        // Air quality is optional
        let air_quality = self.fetcher.air_quality(current.lat, current.lon).await;
        if air_quality.is_none() {
            info!("Continuing without air quality for '{}'", city);
        }

        // Load dataset and train models
        let models = self.models().await?;

        // Predict and compose
        forecast::forecast(city, &current, air_quality, &models).map_err(|e| {
            error!("Forecast for '{}' failed: {}", city, e);
            ForecastError::Forecast
        })
    }

    async fn models(&self) -> std::result::Result<Arc<TrainedModels>, ForecastError> {
        // First successful training is reused for the process lifetime
        if self.training.cache_models {
            self.cached_models
                .get_or_try_init(|| self.train())
                .await
                .map(Arc::clone)
        } else {
            self.train().await
        }
    }

    async fn train(&self) -> std::result::Result<Arc<TrainedModels>, ForecastError> {
        let path = self.dataset_path.clone();
        let training = self.training;

        // Dataset load and fitting run on the blocking pool
        let outcome = tokio::task::spawn_blocking(
            move || -> std::result::Result<TrainedModels, ForecastError> {
                let dataset = Dataset::load(&path).map_err(|e| {
                    error!("Historical data load failed: {}", e);
                    ForecastError::DataLoad
                })?;

                TrainedModels::fit(&dataset, &training).map_err(|e| {
                    error!("Model training failed: {}", e);
                    ForecastError::Forecast
                })
            },
        )
        .await;

        match outcome {
            Ok(result) => result.map(Arc::new),
            Err(e) => {
                error!("Training task did not complete: {}", e);
                Err(ForecastError::Forecast)
            }
        }
    }
}
