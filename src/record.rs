use crate::error::{EdfError, Result};
use crate::header::ANNOTATION_BYTES_PER_RECORD;
use crate::signal::{SampleBatch, SignalTable};

/// Builds data records for one signal table
///
/// The packer owns a single record-wide buffer that is reused for every
/// call to [`pack`](Self::pack). Samples are written as signed 16-bit
/// little-endian integers, signal after signal in table order.
///
/// Batch policies:
/// - `Scalar(v)` fills every sample slot of its signal with `v`
/// - a `Waveform` shorter than the sample rate is padded with the signal's
///   `digital_min`; extra values are ignored
///
/// ```rust
/// use vitaledf::{RecordPacker, SampleBatch, SignalDescriptor, SignalTable};
///
/// let table = SignalTable::builder()
///     .signal(SignalDescriptor::new("SpO2", "%", 1).with_physical_range(0.0, 100.0).with_digital_range(0, 100))?
///     .build()?;
/// let mut packer = RecordPacker::new(table, false);
///
/// let record = packer.pack(&[SampleBatch::Scalar(96.0)], None)?;
/// assert_eq!(record, &96i16.to_le_bytes());
/// # Ok::<(), vitaledf::EdfError>(())
/// ```
#[derive(Debug)]
pub struct RecordPacker {
    table: SignalTable,
    annotations: bool,
    buffer: Vec<u8>,
    padded_samples: u64,
}

impl RecordPacker {
    pub fn new(table: SignalTable, annotations: bool) -> Self {
        let mut packer = RecordPacker {
            table,
            annotations,
            buffer: Vec::new(),
            padded_samples: 0,
        };
        packer.buffer = Vec::with_capacity(packer.record_bytes());
        packer
    }

    pub fn table(&self) -> &SignalTable {
        &self.table
    }

    /// Size of one complete data record in bytes
    pub fn record_bytes(&self) -> usize {
        let annotation_bytes = if self.annotations { ANNOTATION_BYTES_PER_RECORD } else { 0 };
        self.table.record_bytes() + annotation_bytes
    }

    /// Samples filled in with `digital_min` so far
    pub fn padded_samples(&self) -> u64 {
        self.padded_samples
    }

    /// Packs one data record
    ///
    /// `annotation` carries the annotation channel bytes and is only used
    /// when the packer was created with annotations enabled; a missing
    /// block is written as zeros.
    ///
    /// # Errors
    ///
    /// * `EdfError::RecordShape` - `batches` does not hold exactly one
    ///   batch per signal. Nothing is packed in that case.
    pub fn pack(
        &mut self,
        batches: &[SampleBatch],
        annotation: Option<&[u8; ANNOTATION_BYTES_PER_RECORD]>,
    ) -> Result<&[u8]> {
        if batches.len() != self.table.len() {
            return Err(EdfError::RecordShape {
                expected: self.table.len(),
                got: batches.len(),
            });
        }

        self.buffer.clear();

        for (signal, batch) in self.table.iter().zip(batches) {
            let rate = signal.sample_rate as usize;

            if let SampleBatch::Waveform(values) = batch {
                if values.len() < rate {
                    let missing = rate - values.len();
                    log::debug!(
                        "signal '{}' supplied {} of {} samples, padding with digital min",
                        signal.label,
                        values.len(),
                        rate
                    );
                    self.padded_samples += missing as u64;
                }
            }

            for index in 0..rate {
                let value = match batch.sample(index) {
                    Some(physical) => signal.to_stored(physical),
                    None => signal.pad_value(),
                };
                self.buffer.extend_from_slice(&value.to_le_bytes());
            }
        }

        if self.annotations {
            match annotation {
                Some(bytes) => self.buffer.extend_from_slice(bytes),
                None => self.buffer.extend_from_slice(&[0u8; ANNOTATION_BYTES_PER_RECORD]),
            }
        }

        debug_assert_eq!(self.buffer.len(), self.record_bytes());
        Ok(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalDescriptor;

    fn decode(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    fn scalar_and_waveform() -> SignalTable {
        SignalTable::builder()
            .signal(
                SignalDescriptor::new("SpO2", "%", 1)
                    .with_physical_range(0.0, 100.0)
                    .with_digital_range(0, 100),
            )
            .and_then(|b| {
                b.signal(
                    SignalDescriptor::new("Pleth", "", 4)
                        .with_physical_range(0.0, 40.0)
                        .with_digital_range(0, 4000),
                )
            })
            .and_then(|b| b.build())
            .unwrap()
    }

    #[test]
    fn test_scalar_then_waveform_interleave() {
        let mut packer = RecordPacker::new(scalar_and_waveform(), false);
        let batches = [
            SampleBatch::Scalar(97.0),
            SampleBatch::Waveform(vec![10.0, 20.0, 30.0, 40.0]),
        ];
        let record = packer.pack(&batches, None).unwrap();
        assert_eq!(decode(record), [97, 1000, 2000, 3000, 4000]);
    }

    #[test]
    fn test_short_waveform_padded_with_digital_min() {
        let table = SignalTable::builder()
            .signal(
                SignalDescriptor::new("ECG", "uV", 4)
                    .with_physical_range(-10.0, 10.0)
                    .with_digital_range(-1000, 1000),
            )
            .and_then(|b| b.build())
            .unwrap();
        let mut packer = RecordPacker::new(table, false);

        let record = packer.pack(&[SampleBatch::Waveform(vec![5.0])], None).unwrap();
        assert_eq!(decode(record), [500, -1000, -1000, -1000]);
        assert_eq!(packer.padded_samples(), 3);
    }

    #[test]
    fn test_long_waveform_truncated_to_rate() {
        let mut packer = RecordPacker::new(scalar_and_waveform(), false);
        let batches = [
            SampleBatch::Scalar(50.0),
            SampleBatch::Waveform(vec![0.0, 4.0, 8.0, 12.0, 16.0, 20.0]),
        ];
        let record = packer.pack(&batches, None).unwrap();
        assert_eq!(decode(record), [50, 0, 400, 800, 1200]);
    }

    #[test]
    fn test_scalar_held_across_rate() {
        let mut packer = RecordPacker::new(scalar_and_waveform(), false);
        let batches = [SampleBatch::Scalar(100.0), SampleBatch::Scalar(20.0)];
        let record = packer.pack(&batches, None).unwrap();
        assert_eq!(decode(record), [100, 2000, 2000, 2000, 2000]);
    }

    #[test]
    fn test_wrong_batch_count_is_rejected() {
        let mut packer = RecordPacker::new(scalar_and_waveform(), false);
        let err = packer.pack(&[SampleBatch::Scalar(1.0)], None).unwrap_err();
        assert!(matches!(err, EdfError::RecordShape { expected: 2, got: 1 }));
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let mut packer = RecordPacker::new(scalar_and_waveform(), false);
        let batches = [
            SampleBatch::Scalar(130.0),
            SampleBatch::Waveform(vec![-5.0, 45.0, f64::NAN, 40.0]),
        ];
        let record = packer.pack(&batches, None).unwrap();
        assert_eq!(decode(record), [100, 0, 4000, 0, 4000]);
    }

    #[test]
    fn test_annotation_block_appended() {
        let mut packer = RecordPacker::new(scalar_and_waveform(), true);
        assert_eq!(packer.record_bytes(), 10 + 120);

        let mut tal = [0u8; ANNOTATION_BYTES_PER_RECORD];
        tal[..4].copy_from_slice(b"+0\x14\x14");
        let batches = [SampleBatch::Scalar(1.0), SampleBatch::Scalar(1.0)];

        let record = packer.pack(&batches, Some(&tal)).unwrap();
        assert_eq!(record.len(), 130);
        assert_eq!(&record[10..14], b"+0\x14\x14");

        let record = packer.pack(&batches, None).unwrap();
        assert!(record[10..].iter().all(|&b| b == 0));
    }
}
