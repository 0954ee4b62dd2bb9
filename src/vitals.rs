//! Vital-sign signal table and a synthetic sample source
//!
//! [`standard_table`] describes the channels a pulse oximeter / bedside
//! monitor produces. [`VitalsSimulator`] fills that table with plausible,
//! reproducible data for demos and tests.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::signal::{SampleBatch, SignalDescriptor, SignalTable};
use crate::source::SampleSource;

pub const SPO2_LABEL: &str = "SpO2";
pub const PULSE_LABEL: &str = "Pulse";
pub const PLETH_LABEL: &str = "Pleth";
pub const ECG_LABEL: &str = "ECG";
pub const RESP_LABEL: &str = "Resp";

/// Builds the vital-sign table: SpO2, pulse rate, plethysmogram, ECG and
/// respiration rate, in that order. The scalar channels carry one sample
/// per record; `pleth_rate` and `ecg_rate` set the waveform resolution.
///
/// ```rust
/// let table = vitaledf::vitals::standard_table(64, 250)?;
/// assert_eq!(table.len(), 5);
/// assert_eq!(table.total_samples_per_record(), 1 + 1 + 64 + 250 + 1);
/// # Ok::<(), vitaledf::EdfError>(())
/// ```
pub fn standard_table(pleth_rate: u32, ecg_rate: u32) -> Result<SignalTable> {
    SignalTable::builder()
        .signal(
            SignalDescriptor::new(SPO2_LABEL, "%", 1)
                .with_physical_range(0.0, 100.0)
                .with_digital_range(0, 1000)
                .with_transducer("Pulse oximeter finger probe"),
        )?
        .signal(
            SignalDescriptor::new(PULSE_LABEL, "bpm", 1)
                .with_physical_range(0.0, 300.0)
                .with_digital_range(0, 300),
        )?
        .signal(
            SignalDescriptor::new(PLETH_LABEL, "", pleth_rate)
                .with_physical_range(0.0, 100.0)
                .with_transducer("Pulse oximeter finger probe"),
        )?
        .signal(
            SignalDescriptor::new(ECG_LABEL, "mV", ecg_rate)
                .with_physical_range(-5.0, 5.0)
                .with_transducer("ECG electrodes")
                .with_prefilter("HP:0.5Hz LP:40Hz"),
        )?
        .signal(
            SignalDescriptor::new(RESP_LABEL, "rpm", 1)
                .with_physical_range(0.0, 60.0)
                .with_digital_range(0, 600),
        )?
        .build()
}

/// Parameters of the simulated patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalsConfig {
    /// Number of data records to produce
    pub records: u64,
    /// Length of one data record; must match the encoder's
    /// `record_duration_seconds`
    pub record_duration_seconds: f64,
    pub heart_rate_bpm: f64,
    pub spo2_percent: f64,
    pub respiration_rate: f64,
    /// Amplitude of uniform noise added to the waveforms, in their units
    pub noise: f64,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        VitalsConfig {
            records: 60,
            record_duration_seconds: 1.0,
            heart_rate_bpm: 72.0,
            spo2_percent: 97.0,
            respiration_rate: 14.0,
            noise: 0.02,
            seed: 42,
        }
    }
}

/// Deterministic vital-sign generator
///
/// Scalar vitals drift around their baseline once per record. The
/// plethysmogram and ECG are synthesized beat by beat, their beat phase
/// advancing at the drifting pulse rate over each record's duration, so
/// the Pulse channel and the waveforms agree. Channels are matched by label, so any table whose
/// labels are a subset of [`standard_table`]'s works; unknown labels
/// receive their physical minimum.
///
/// ```rust
/// use vitaledf::vitals::{standard_table, VitalsConfig, VitalsSimulator};
/// use vitaledf::SampleSource;
///
/// let table = standard_table(64, 250)?;
/// let mut simulator = VitalsSimulator::new(VitalsConfig { records: 2, ..Default::default() });
///
/// let record = simulator.next_record(&table).unwrap();
/// assert_eq!(record.len(), 5);
/// assert_eq!(simulator.remaining_records(), Some(1));
/// # Ok::<(), vitaledf::EdfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct VitalsSimulator {
    config: VitalsConfig,
    rng: StdRng,
    record: u64,
    /// Cardiac and respiratory cycle position at the start of the record
    beat_phase: f64,
    breath_phase: f64,
    spo2: f64,
    pulse: f64,
    respiration: f64,
}

impl VitalsSimulator {
    pub fn new(config: VitalsConfig) -> Self {
        VitalsSimulator {
            rng: StdRng::seed_from_u64(config.seed),
            record: 0,
            beat_phase: 0.0,
            breath_phase: 0.0,
            spo2: config.spo2_percent,
            pulse: config.heart_rate_bpm,
            respiration: config.respiration_rate,
            config,
        }
    }

    pub fn config(&self) -> &VitalsConfig {
        &self.config
    }

    // 随机游走，向基线回归
    fn drift(&mut self, value: f64, baseline: f64, step: f64, min: f64, max: f64) -> f64 {
        let jitter = self.rng.gen_range(-step..=step);
        (value + jitter + (baseline - value) * 0.1).clamp(min, max)
    }

    fn noise(&mut self) -> f64 {
        if self.config.noise > 0.0 {
            self.rng.gen_range(-self.config.noise..=self.config.noise)
        } else {
            0.0
        }
    }

    fn waveform<F>(&mut self, rate: u32, shape: F) -> Vec<f64>
    where
        F: Fn(f64) -> f64,
    {
        let beats_per_sample = self.pulse / 60.0 * self.config.record_duration_seconds / rate as f64;
        let start = self.beat_phase;
        (0..rate)
            .map(|i| {
                let phase = (start + i as f64 * beats_per_sample).fract();
                shape(phase) + self.noise()
            })
            .collect()
    }
}

fn gaussian(phase: f64, center: f64, width: f64) -> f64 {
    (-(phase - center).powi(2) / (2.0 * width * width)).exp()
}

/// Plethysmogram shape over one beat, 0..100
fn pleth_shape(phase: f64) -> f64 {
    20.0 + 60.0 * gaussian(phase, 0.2, 0.07) + 15.0 * gaussian(phase, 0.5, 0.08)
}

/// ECG shape over one beat in mV: P wave, QRS complex, T wave
fn ecg_shape(phase: f64) -> f64 {
    0.15 * gaussian(phase, 0.2, 0.025) - 0.1 * gaussian(phase, 0.36, 0.01) + 1.2 * gaussian(phase, 0.4, 0.012)
        - 0.25 * gaussian(phase, 0.44, 0.01)
        + 0.3 * gaussian(phase, 0.65, 0.04)
}

impl SampleSource for VitalsSimulator {
    fn next_record(&mut self, table: &SignalTable) -> Option<Vec<SampleBatch>> {
        if self.record >= self.config.records {
            return None;
        }

        self.spo2 = self.drift(self.spo2, self.config.spo2_percent, 0.3, 70.0, 100.0);
        self.pulse = self.drift(self.pulse, self.config.heart_rate_bpm, 1.0, 20.0, 250.0);
        self.respiration = self.drift(self.respiration, self.config.respiration_rate, 0.5, 2.0, 50.0);
        let breathing = (2.0 * PI * self.breath_phase).sin();

        let mut record = Vec::with_capacity(table.len());
        for signal in table {
            let batch = match signal.label.as_str() {
                SPO2_LABEL => SampleBatch::Scalar(self.spo2),
                PULSE_LABEL => SampleBatch::Scalar(self.pulse.round()),
                RESP_LABEL => SampleBatch::Scalar(self.respiration),
                PLETH_LABEL => {
                    let mut values = self.waveform(signal.sample_rate, pleth_shape);
                    // 呼吸引起的基线波动
                    values.iter_mut().for_each(|v| *v += 3.0 * breathing);
                    SampleBatch::Waveform(values)
                }
                ECG_LABEL => SampleBatch::Waveform(self.waveform(signal.sample_rate, ecg_shape)),
                _ => SampleBatch::Scalar(signal.physical_min),
            };
            record.push(batch);
        }

        let duration = self.config.record_duration_seconds;
        self.beat_phase = (self.beat_phase + self.pulse / 60.0 * duration).fract();
        self.breath_phase = (self.breath_phase + self.respiration / 60.0 * duration).fract();
        self.record += 1;
        Some(record)
    }

    fn remaining_records(&self) -> Option<u64> {
        Some(self.config.records.saturating_sub(self.record))
    }
}
