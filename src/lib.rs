pub mod config;
pub mod dataset;
pub mod error;
pub mod fetcher;
pub mod forecast;
pub mod forest;
pub mod models;
pub mod server;
pub mod service;
pub mod trainer;

pub use error::{AppError, ForecastError, Result};
pub use service::ForecastService;
