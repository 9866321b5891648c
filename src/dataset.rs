use crate::error::{AppError, Result};
use crate::models::HistoricalRow;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "MinTemp",
    "MaxTemp",
    "Temp",
    "Humidity",
    "Pressure",
    "WindGustSpeed",
    "RainTomorrow",
];

const NULL_TOKENS: [&str; 4] = ["", "na", "nan", "null"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub total_rows: usize,
    pub dropped_nulls: usize,
    pub dropped_duplicates: usize,
    pub dropped_invalid: usize,
    pub retained: usize,
}

/// Cleaned historical observations, ready for training.
#[derive(Debug, Clone)]
pub struct Dataset {
    rows: Vec<HistoricalRow>,
    stats: LoadStats,
}

/// Column positions of the required fields within a CSV header.
struct ColumnIndex([usize; 7]);

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let mut positions = [0usize; 7];
        let mut missing = Vec::new();

        for (slot, name) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            match headers.iter().position(|h| h.trim() == name) {
                Some(pos) => *slot = pos,
                None => missing.push(name),
            }
        }

        if !missing.is_empty() {
            return Err(AppError::Dataset(format!(
                "Missing columns: {}",
                missing.join(", ")
            )));
        }

        Ok(Self(positions))
    }

    fn fields<'r>(&self, record: &'r csv::StringRecord) -> [&'r str; 7] {
        self.0.map(|pos| record.get(pos).unwrap_or("").trim())
    }

    /// Trimmed values of every column outside the required set.
    fn extras(&self, record: &csv::StringRecord) -> Vec<String> {
        record
            .iter()
            .enumerate()
            .filter(|(pos, _)| !self.0.contains(pos))
            .map(|(_, field)| field.trim().to_string())
            .collect()
    }
}

/// Identity of a row for duplicate detection: parsed required values plus
/// the raw text of any other columns, so `8` and `8.0` compare equal.
#[derive(Debug, PartialEq, Eq, Hash)]
struct RowKey {
    values: [u64; 6],
    rain_tomorrow: bool,
    extras: Vec<String>,
}

impl RowKey {
    fn new(row: &HistoricalRow, extras: Vec<String>) -> Self {
        let values = [
            row.min_temp,
            row.max_temp,
            row.temp,
            row.humidity,
            row.pressure,
            row.wind_gust_speed,
        ]
        // -0.0 and 0.0 are the same reading
        .map(|v| (v + 0.0).to_bits());

        Self {
            values,
            rain_tomorrow: row.rain_tomorrow,
            extras,
        }
    }
}

impl Dataset {
    /// Load and clean the dataset at `path`.
    ///
    /// A missing file or missing required columns is an error; individual
    /// bad rows are dropped and counted.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::Dataset(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let file = std::fs::File::open(path)?;
        let dataset = Self::from_reader(file)?;

        info!(
            "Loaded {} historical rows from {} ({} nulls, {} duplicates, {} invalid dropped)",
            dataset.stats.retained,
            path.display(),
            dataset.stats.dropped_nulls,
            dataset.stats.dropped_duplicates,
            dataset.stats.dropped_invalid
        );

        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns = ColumnIndex::from_headers(csv_reader.headers()?)?;

        let mut rows = Vec::new();
        let mut stats = LoadStats::default();
        let mut seen: HashSet<RowKey> = HashSet::new();

        for (line_num, record) in csv_reader.records().enumerate() {
            let record = record?;
            stats.total_rows += 1;

            let fields = columns.fields(&record);
            if fields.iter().any(|f| is_null(f)) {
                stats.dropped_nulls += 1;
                continue;
            }

            let row = match parse_row(fields) {
                Ok(row) => row,
                Err(e) => {
                    stats.dropped_invalid += 1;
                    // header is line 1
                    warn!("Dropping dataset line {}: {}", line_num + 2, e);
                    continue;
                }
            };

            if !seen.insert(RowKey::new(&row, columns.extras(&record))) {
                stats.dropped_duplicates += 1;
                continue;
            }

            rows.push(row);
        }

        stats.retained = rows.len();

        if rows.is_empty() {
            return Err(AppError::Dataset(format!(
                "No usable rows out of {} in dataset",
                stats.total_rows
            )));
        }

        debug!("Dataset load stats: {:?}", stats);
        Ok(Self { rows, stats })
    }

    pub fn rows(&self) -> &[HistoricalRow] {
        &self.rows
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn is_null(field: &str) -> bool {
    NULL_TOKENS
        .iter()
        .any(|token| field.eq_ignore_ascii_case(token))
}

fn parse_row(fields: [&str; 7]) -> Result<HistoricalRow> {
    let [min_temp, max_temp, temp, humidity, pressure, wind_gust_speed, rain_tomorrow] = fields;

    Ok(HistoricalRow::new(
        parse_float("MinTemp", min_temp)?,
        parse_float("MaxTemp", max_temp)?,
        parse_float("Temp", temp)?,
        parse_float("Humidity", humidity)?,
        parse_float("Pressure", pressure)?,
        parse_float("WindGustSpeed", wind_gust_speed)?,
        parse_flag("RainTomorrow", rain_tomorrow)?,
    ))
}

fn parse_float(column: &str, s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| AppError::Parse(format!("{} '{}': {}", column, s, e)))?;

    if !value.is_finite() {
        return Err(AppError::Parse(format!("{} '{}' is not finite", column, s)));
    }

    Ok(value)
}

fn parse_flag(column: &str, s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(AppError::Parse(format!(
            "{} '{}' is not a yes/no value",
            column, s
        ))),
    }
}
