use crate::config::TrainingConfig;
use crate::dataset::Dataset;
use crate::error::{AppError, Result};
use crate::forest::{ForestParams, RandomForestClassifier, RandomForestRegressor};
use crate::models::{FeatureVector, HistoricalRow, FEATURE_COUNT};
use ndarray::{Array1, Array2};
use std::time::Instant;
use tracing::{debug, info};

/// Point predictions for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predictions {
    pub rain_probability: f64,
    pub temperature: f64,
    pub humidity: f64,
}

/// Rain classifier plus temperature and humidity regressors, all fit on the
/// same six features.
#[derive(Debug, Clone)]
pub struct TrainedModels {
    rain: RandomForestClassifier,
    temperature: RandomForestRegressor,
    humidity: RandomForestRegressor,
    trained_rows: usize,
}

impl From<&TrainingConfig> for ForestParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            seed: config.seed,
            max_depth: config.max_depth,
        }
    }
}

impl TrainedModels {
    pub fn fit(dataset: &Dataset, config: &TrainingConfig) -> Result<Self> {
        let rows = dataset.rows();
        if rows.is_empty() {
            return Err(AppError::Training("Dataset has no rows".to_string()));
        }

        let started = Instant::now();
        let params = ForestParams::from(config);

        let x = feature_matrix(rows)?;
        let rain_labels: Vec<bool> = rows.iter().map(|r| r.rain_tomorrow).collect();
        let temperatures: Array1<f64> = rows.iter().map(|r| r.temp).collect();
        let humidities: Array1<f64> = rows.iter().map(|r| r.humidity).collect();

        let rain = RandomForestClassifier::fit(&x, &rain_labels, &params)?;
        debug!("Rain classifier fit with {} trees", rain.n_trees());
        let temperature = RandomForestRegressor::fit(&x, &temperatures, &params)?;
        let humidity = RandomForestRegressor::fit(&x, &humidities, &params)?;

        info!(
            "Trained 3 models ({} trees each) on {} rows in {:?}",
            params.n_estimators,
            rows.len(),
            started.elapsed()
        );

        Ok(Self {
            rain,
            temperature,
            humidity,
            trained_rows: rows.len(),
        })
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Predictions> {
        if let Some(name) = features.first_non_finite() {
            return Err(AppError::Prediction(format!(
                "Non-finite {} in input features: {:?}",
                name, features
            )));
        }

        let input = features.to_array();
        Ok(Predictions {
            rain_probability: self.rain.predict_proba(&input)?,
            temperature: self.temperature.predict(&input)?,
            humidity: self.humidity.predict(&input)?,
        })
    }

    pub fn trained_rows(&self) -> usize {
        self.trained_rows
    }
}

pub fn feature_matrix(rows: &[HistoricalRow]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = rows
        .iter()
        .flat_map(|row| row.features().to_array())
        .collect();

    Array2::from_shape_vec((rows.len(), FEATURE_COUNT), flat)
        .map_err(|e| AppError::Training(format!("Failed to build feature matrix: {}", e)))
}
