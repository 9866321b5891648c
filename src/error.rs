use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Prediction error: {0}")]
    Prediction(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// The only failure states a caller ever sees.
///
/// Internal causes are logged at the failure site and are not carried here.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastError {
    #[error("Please enter a city")]
    EmptyCity,

    #[error("Incorrect city or country name. Please check your input.")]
    CityNotFound,

    #[error("Error loading historical data")]
    DataLoad,

    #[error("Weather forecasting error")]
    Forecast,
}

impl ForecastError {
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ForecastError::EmptyCity => 400,
            ForecastError::CityNotFound => 404,
            ForecastError::DataLoad | ForecastError::Forecast => 500,
        }
    }
}
