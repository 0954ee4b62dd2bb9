use std::collections::VecDeque;

use crate::config::EncoderConfig;
use crate::error::Result;
use crate::session::{EncodingSession, SessionSummary};
use crate::signal::{SampleBatch, SignalTable};
use crate::sink::RecordSink;

/// Producer of physical samples, one data record at a time
///
/// Implementations decide where values come from (a device, a stored
/// list, a simulator). For every record a source returns one
/// [`SampleBatch`] per signal of the table, in table order.
pub trait SampleSource {
    /// Samples of the next data record, or `None` when the source is
    /// exhausted
    fn next_record(&mut self, table: &SignalTable) -> Option<Vec<SampleBatch>>;

    /// Exact number of records still to come, if the source knows it
    fn remaining_records(&self) -> Option<u64> {
        None
    }
}

/// Replays a stored list of records
///
/// ```rust
/// use vitaledf::{RecordedSource, SampleBatch, SampleSource};
///
/// let source = RecordedSource::new(vec![
///     vec![SampleBatch::Scalar(96.0)],
///     vec![SampleBatch::Scalar(95.0)],
/// ]);
/// assert_eq!(source.remaining_records(), Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordedSource {
    records: VecDeque<Vec<SampleBatch>>,
}

impl RecordedSource {
    pub fn new(records: Vec<Vec<SampleBatch>>) -> Self {
        RecordedSource {
            records: records.into(),
        }
    }

    pub fn push(&mut self, record: Vec<SampleBatch>) {
        self.records.push_back(record);
    }
}

impl SampleSource for RecordedSource {
    fn next_record(&mut self, _table: &SignalTable) -> Option<Vec<SampleBatch>> {
        self.records.pop_front()
    }

    fn remaining_records(&self) -> Option<u64> {
        Some(self.records.len() as u64)
    }
}

impl<T: SampleSource + ?Sized> SampleSource for &mut T {
    fn next_record(&mut self, table: &SignalTable) -> Option<Vec<SampleBatch>> {
        (**self).next_record(table)
    }

    fn remaining_records(&self) -> Option<u64> {
        (**self).remaining_records()
    }
}

/// Encodes everything `source` produces into `sink`
///
/// When the source knows its length and the configuration does not set
/// `planned_records`, the length is announced in the header so that the
/// file is written front to back without any rewrite.
///
/// ```rust
/// use vitaledf::{encode, EncoderConfig, MemorySink, RecordedSource, SampleBatch, SignalDescriptor, SignalTable};
///
/// let table = SignalTable::builder()
///     .signal(SignalDescriptor::new("Pulse", "bpm", 1).with_physical_range(0.0, 300.0).with_digital_range(0, 300))?
///     .build()?;
/// let source = RecordedSource::new(vec![vec![SampleBatch::Scalar(72.0)]; 10]);
///
/// let (summary, sink) = encode(&table, EncoderConfig::default(), source, MemorySink::new())?;
/// assert_eq!(summary.records, 10);
/// assert_eq!(sink.as_bytes().len(), 512 + 10 * 2);
/// # Ok::<(), vitaledf::EdfError>(())
/// ```
///
/// # Errors
///
/// Any error of [`EncodingSession`]; the output is discarded in that case.
pub fn encode<Src, S>(
    table: &SignalTable,
    mut config: EncoderConfig,
    mut source: Src,
    sink: S,
) -> Result<(SessionSummary, S)>
where
    Src: SampleSource,
    S: RecordSink,
{
    if config.planned_records.is_none() {
        config.planned_records = source.remaining_records();
    }

    let mut session = EncodingSession::open(table.clone(), config, sink)?;
    while let Some(batches) = source.next_record(table) {
        session.write_record(&batches)?;
    }
    let summary = session.close()?;

    match session.into_sink() {
        Some(sink) => Ok((summary, sink)),
        None => Err(crate::EdfError::SessionClosed),
    }
}
