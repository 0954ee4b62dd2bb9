//! # vitaledf
//!
//! A pure Rust encoder for EDF (European Data Format) and EDF+ files,
//! aimed at vital-sign recordings: SpO2, pulse rate, plethysmogram, ECG and
//! respiratory metrics, each with its own sample rate and scaling.
//!
//! ## Quick Start
//!
//! ```rust
//! use vitaledf::{EncoderConfig, EncodingSession, FileSink, SampleBatch, SignalDescriptor, SignalTable};
//!
//! # let dir = tempfile::tempdir()?;
//! # let path = dir.path().join("oximetry.edf");
//! // Describe the channels once
//! let table = SignalTable::builder()
//!     .signal(
//!         SignalDescriptor::new("SpO2", "%", 1)
//!             .with_physical_range(0.0, 100.0)
//!             .with_digital_range(0, 100),
//!     )?
//!     .signal(
//!         SignalDescriptor::new("Pleth", "", 4)
//!             .with_physical_range(0.0, 40.0)
//!             .with_digital_range(0, 4000),
//!     )?
//!     .build()?;
//!
//! // Open a session: the header is written immediately
//! let config = EncoderConfig::new("Patient 17", "Overnight oximetry");
//! let mut session = EncodingSession::open(table, config, FileSink::create(&path)?)?;
//!
//! // One data record per second: one batch per signal, in table order
//! for second in 0..10 {
//!     session.write_record(&[
//!         SampleBatch::Scalar(96.0 + (second % 3) as f64),
//!         SampleBatch::Waveform(vec![10.0, 20.0, 30.0, 40.0]),
//!     ])?;
//! }
//!
//! // Closing makes the header's record count match what was written
//! let summary = session.close()?;
//! assert_eq!(summary.records, 10);
//! assert_eq!(std::fs::metadata(&path)?.len(), 768 + 10 * 10);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Physical vs Digital Values
//!
//! EDF stores every sample as a signed 16-bit integer. Each signal maps its
//! physical range linearly onto its digital range:
//!
//! ```rust
//! use vitaledf::SignalDescriptor;
//!
//! let ecg = SignalDescriptor::new("ECG", "mV", 250).with_physical_range(-5.0, 5.0);
//!
//! assert_eq!(ecg.to_digital(-5.0), -32768);
//! assert_eq!(ecg.to_digital(5.0), 32767);
//! assert!((ecg.to_physical(ecg.to_digital(1.25)) - 1.25).abs() <= ecg.resolution());
//! ```
//!
//! Values outside the physical range are clamped, and a signal whose range
//! is degenerate always stores its `digital_min`.
//!
//! ## Failure Handling
//!
//! A session either produces a complete file or none at all: when a write
//! fails, or a session is dropped without [`EncodingSession::close`], the
//! output is discarded through [`RecordSink::discard`] (a [`FileSink`]
//! deletes its file).

pub mod annotation;
pub mod config;
pub mod error;
pub mod header;
pub mod record;
pub mod session;
pub mod signal;
pub mod sink;
pub mod source;
pub mod utils;
pub mod vitals;

// Re-export main types for convenience
pub use annotation::Annotation;
pub use config::EncoderConfig;
pub use error::{EdfError, Result};
pub use record::RecordPacker;
pub use session::{EncodingSession, SessionState, SessionSummary};
pub use signal::{SampleBatch, SignalDescriptor, SignalTable, SignalTableBuilder};
pub use sink::{FileSink, MemorySink, RecordSink, StreamSink};
pub use source::{encode, RecordedSource, SampleSource};

// Important constants
pub const EDFLIB_TIME_DIMENSION: i64 = 10_000_000; // 100 nanoseconds unit
pub const EDF_MAX_SIGNALS: usize = 4096;
pub const EDFLIB_MAX_ANNOTATION_LEN: usize = 512;

/// Library version
///
/// ```rust
/// let version = vitaledf::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
