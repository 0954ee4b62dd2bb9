use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{EdfError, Result};
use crate::utils::fits_number_field;

/// Longest data record the encoder accepts, in seconds
pub const MAX_RECORD_DURATION_SECONDS: f64 = 3600.0;

/// Construction-time options of an encoding session
///
/// Every field has a default, so a configuration can be deserialized from a
/// partial document:
///
/// ```rust
/// use vitaledf::EncoderConfig;
///
/// let config = EncoderConfig::new("Jane Doe", "Overnight oximetry");
/// assert_eq!(config.record_duration_seconds, 1.0);
/// assert_eq!(config.planned_records, None);
/// assert!(!config.annotations);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Written into the 80-byte patient identification field
    pub patient_name: String,
    /// Written into the 80-byte recording identification field
    pub recording_name: String,
    /// Seconds covered by one data record
    pub record_duration_seconds: f64,
    /// Recording start, written as `dd.mm.yy` / `hh.mm.ss`
    pub start: NaiveDateTime,
    /// Number of data records the caller will write, if known upfront.
    /// When it matches the records actually written, closing the session
    /// needs no rewrite of the header.
    pub planned_records: Option<u64>,
    /// Produce an EDF+ file with an annotation channel
    pub annotations: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            patient_name: "X".to_string(),
            recording_name: "X".to_string(),
            record_duration_seconds: 1.0,
            start: default_start(),
            planned_records: None,
            annotations: false,
        }
    }
}

// 默认开始时间 1985-01-01 00:00:00
fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1985, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

impl EncoderConfig {
    pub fn new(patient_name: &str, recording_name: &str) -> Self {
        EncoderConfig {
            patient_name: patient_name.to_string(),
            recording_name: recording_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    pub fn with_record_duration(mut self, seconds: f64) -> Self {
        self.record_duration_seconds = seconds;
        self
    }

    pub fn with_planned_records(mut self, records: u64) -> Self {
        self.planned_records = Some(records);
        self
    }

    pub fn with_annotations(mut self, enabled: bool) -> Self {
        self.annotations = enabled;
        self
    }

    /// Checks the options that cannot be represented in the header
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidConfig` - the record duration is not in
    ///   `(0, 3600]`, or cannot be written into its 8-character field
    ///   without losing precision
    pub fn validate(&self) -> Result<()> {
        let duration = self.record_duration_seconds;
        if !duration.is_finite() || duration <= 0.0 || duration > MAX_RECORD_DURATION_SECONDS {
            return Err(EdfError::InvalidConfig(format!(
                "record duration must be between 0 and {} seconds, got {}",
                MAX_RECORD_DURATION_SECONDS, duration
            )));
        }

        if !fits_number_field(duration, 8) {
            return Err(EdfError::InvalidConfig(format!(
                "record duration {} cannot be written exactly in the header",
                duration
            )));
        }
        Ok(())
    }
}
