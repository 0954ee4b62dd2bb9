use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EdfError, Result};
use crate::utils::{fits_number_field, header_number};
use crate::EDF_MAX_SIGNALS;

/// Largest value the 8-character samples-per-record header field can hold
const MAX_SAMPLE_RATE: u32 = 99_999_999;

/// Range of integers the 8-character digital min/max fields can hold
const DIGITAL_FIELD_RANGE: std::ops::RangeInclusive<i32> = -9_999_999..=99_999_999;

/// Static description of one channel in an EDF file
///
/// The descriptor carries the label and unit written into the header and the
/// two ranges that define the linear physical/digital scaling of the channel.
///
/// ```rust
/// use vitaledf::SignalDescriptor;
///
/// let spo2 = SignalDescriptor::new("SpO2", "%", 1)
///     .with_physical_range(0.0, 100.0)
///     .with_digital_range(0, 100);
///
/// assert_eq!(spo2.to_digital(96.0), 96);
/// assert_eq!(spo2.to_physical(50), 50.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    pub label: String,
    #[serde(default)]
    pub physical_unit: String,
    /// Samples of this signal in every data record
    pub sample_rate: u32,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    #[serde(default)]
    pub transducer: String,
    #[serde(default)]
    pub prefilter: String,
}

impl SignalDescriptor {
    /// Creates a descriptor with the full 16-bit digital range and a
    /// physical range equal to it. Use the `with_*` methods to adjust.
    pub fn new(label: &str, physical_unit: &str, sample_rate: u32) -> Self {
        SignalDescriptor {
            label: label.to_string(),
            physical_unit: physical_unit.to_string(),
            sample_rate,
            physical_min: i16::MIN as f64,
            physical_max: i16::MAX as f64,
            digital_min: i16::MIN as i32,
            digital_max: i16::MAX as i32,
            transducer: String::new(),
            prefilter: String::new(),
        }
    }

    pub fn with_physical_range(mut self, min: f64, max: f64) -> Self {
        self.physical_min = min;
        self.physical_max = max;
        self
    }

    pub fn with_digital_range(mut self, min: i32, max: i32) -> Self {
        self.digital_min = min;
        self.digital_max = max;
        self
    }

    pub fn with_transducer(mut self, transducer: &str) -> Self {
        self.transducer = transducer.to_string();
        self
    }

    pub fn with_prefilter(mut self, prefilter: &str) -> Self {
        self.prefilter = prefilter.to_string();
        self
    }

    /// Checks the descriptor invariants
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidSignal` - empty label, zero sample rate, or a
    ///   physical/digital range whose maximum is not above its minimum
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(EdfError::invalid_signal(&self.label, "label is empty"));
        }
        if self.sample_rate == 0 {
            return Err(EdfError::invalid_signal(&self.label, "sample rate must be positive"));
        }
        if self.sample_rate > MAX_SAMPLE_RATE {
            return Err(EdfError::invalid_signal(
                &self.label,
                format!("sample rate {} does not fit the header field", self.sample_rate),
            ));
        }
        if !self.physical_min.is_finite() || !self.physical_max.is_finite() {
            return Err(EdfError::invalid_signal(&self.label, "physical range must be finite"));
        }
        if self.physical_max <= self.physical_min {
            return Err(EdfError::invalid_signal(
                &self.label,
                format!(
                    "physical max {} must be greater than physical min {}",
                    self.physical_max, self.physical_min
                ),
            ));
        }
        if !(self.physical_max - self.physical_min).is_finite() {
            return Err(EdfError::invalid_signal(&self.label, "physical range is too wide"));
        }
        for (name, bound) in [("min", self.physical_min), ("max", self.physical_max)] {
            if !fits_number_field(bound, 8) {
                return Err(EdfError::invalid_signal(
                    &self.label,
                    format!("physical {} {} cannot be written into the 8-character header field", name, bound),
                ));
            }
        }
        // the header values are what readers scale with
        if header_number(self.physical_max, 8) <= header_number(self.physical_min, 8) {
            return Err(EdfError::invalid_signal(
                &self.label,
                "physical range collapses when written into the header",
            ));
        }
        if self.digital_max <= self.digital_min {
            return Err(EdfError::invalid_signal(
                &self.label,
                format!(
                    "digital max {} must be greater than digital min {}",
                    self.digital_max, self.digital_min
                ),
            ));
        }
        for (name, bound) in [("min", self.digital_min), ("max", self.digital_max)] {
            if !DIGITAL_FIELD_RANGE.contains(&bound) {
                return Err(EdfError::invalid_signal(
                    &self.label,
                    format!("digital {} {} cannot be written into the 8-character header field", name, bound),
                ));
            }
        }
        Ok(())
    }

    fn is_degenerate(&self) -> bool {
        self.physical_max == self.physical_min || self.digital_max == self.digital_min
    }

    /// 将物理值转换为数字值
    ///
    /// `round(dmin + (physical - pmin) * (dmax - dmin) / (pmax - pmin))`,
    /// rounded half away from zero and clamped to `[dmin, dmax]`.
    /// A degenerate range yields `digital_min`, as does NaN.
    pub fn to_digital(&self, physical: f64) -> i32 {
        if self.is_degenerate() || physical.is_nan() {
            return self.digital_min;
        }

        let dmin = self.digital_min as f64;
        let dmax = self.digital_max as f64;
        let digital = dmin
            + (physical - self.physical_min) * (dmax - dmin)
                / (self.physical_max - self.physical_min);

        digital.round().max(dmin).min(dmax) as i32
    }

    /// 将数字值转换为物理值
    pub fn to_physical(&self, digital: i32) -> f64 {
        if self.is_degenerate() {
            return self.physical_min;
        }

        let dmin = self.digital_min as f64;
        self.physical_min
            + (digital as f64 - dmin) * (self.physical_max - self.physical_min)
                / (self.digital_max as f64 - dmin)
    }

    /// Physical value represented by one digital step
    pub fn resolution(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        (self.physical_max - self.physical_min) / (self.digital_max - self.digital_min) as f64
    }

    /// The value actually stored in the file: `to_digital` further clamped
    /// to the signed 16-bit range.
    pub fn to_stored(&self, physical: f64) -> i16 {
        clamp_i16(self.to_digital(physical))
    }

    /// Digital value used for samples a waveform batch does not provide
    pub fn pad_value(&self) -> i16 {
        clamp_i16(self.digital_min)
    }
}

pub(crate) fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Physical samples of one signal for one data record
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBatch {
    /// One value held for every sample slot of the record
    Scalar(f64),
    /// Consecutive samples; expected to hold at least `sample_rate` values
    Waveform(Vec<f64>),
}

impl SampleBatch {
    /// Physical value at `index` within the record, if the batch provides one
    pub fn sample(&self, index: usize) -> Option<f64> {
        match self {
            SampleBatch::Scalar(value) => Some(*value),
            SampleBatch::Waveform(values) => values.get(index).copied(),
        }
    }
}

impl From<f64> for SampleBatch {
    fn from(value: f64) -> Self {
        SampleBatch::Scalar(value)
    }
}

impl From<Vec<f64>> for SampleBatch {
    fn from(values: Vec<f64>) -> Self {
        SampleBatch::Waveform(values)
    }
}

impl From<&[f64]> for SampleBatch {
    fn from(values: &[f64]) -> Self {
        SampleBatch::Waveform(values.to_vec())
    }
}

/// Ordered, validated and frozen list of signal descriptors
///
/// Built once through [`SignalTableBuilder`]; cloning is cheap and clones
/// share the same descriptors, so one table can back several sessions.
///
/// ```rust
/// use vitaledf::{SignalDescriptor, SignalTable};
///
/// let table = SignalTable::builder()
///     .signal(SignalDescriptor::new("Pulse", "bpm", 1).with_physical_range(0.0, 300.0))?
///     .signal(SignalDescriptor::new("Pleth", "", 64))?
///     .build()?;
///
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.total_samples_per_record(), 65);
/// # Ok::<(), vitaledf::EdfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SignalTable {
    signals: Arc<[SignalDescriptor]>,
}

impl SignalTable {
    pub fn builder() -> SignalTableBuilder {
        SignalTableBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SignalDescriptor> {
        self.signals.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SignalDescriptor> {
        self.signals.iter()
    }

    pub fn signals(&self) -> &[SignalDescriptor] {
        &self.signals
    }

    /// Sum of all sample rates, i.e. samples in one data record
    pub fn total_samples_per_record(&self) -> usize {
        self.signals.iter().map(|s| s.sample_rate as usize).sum()
    }

    /// Size of the signal part of one data record in bytes
    pub fn record_bytes(&self) -> usize {
        self.total_samples_per_record() * 2
    }
}

impl<'a> IntoIterator for &'a SignalTable {
    type Item = &'a SignalDescriptor;
    type IntoIter = std::slice::Iter<'a, SignalDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Append-only builder for [`SignalTable`]
#[derive(Debug, Default)]
pub struct SignalTableBuilder {
    signals: Vec<SignalDescriptor>,
}

impl SignalTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and appends a signal
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidSignal` - the descriptor violates its invariants
    /// * `EdfError::TooManySignals` - the table is already full
    pub fn add_signal(&mut self, descriptor: SignalDescriptor) -> Result<&mut Self> {
        descriptor.validate()?;
        if self.signals.len() >= EDF_MAX_SIGNALS {
            return Err(EdfError::TooManySignals(self.signals.len() + 1));
        }
        self.signals.push(descriptor);
        Ok(self)
    }

    /// Chainable form of [`add_signal`](Self::add_signal)
    pub fn signal(mut self, descriptor: SignalDescriptor) -> Result<Self> {
        self.add_signal(descriptor)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Freezes the table
    ///
    /// # Errors
    ///
    /// * `EdfError::EmptySignalTable` - no signal was added
    pub fn build(self) -> Result<SignalTable> {
        if self.signals.is_empty() {
            return Err(EdfError::EmptySignalTable);
        }
        Ok(SignalTable {
            signals: self.signals.into(),
        })
    }
}
