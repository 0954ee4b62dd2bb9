use std::fs;
use std::io::{self, Write};

use vitaledf::vitals::{standard_table, VitalsConfig, VitalsSimulator};
use vitaledf::{
    encode, EdfError, EncoderConfig, FileSink, RecordSink, RecordedSource, SampleBatch, SampleSource,
    StreamSink,
};

/// Writer that accepts a fixed number of bytes, then fails
#[derive(Debug)]
struct FlakyPipe {
    received: Vec<u8>,
    capacity: usize,
}

impl Write for FlakyPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.received.len() + buf.len() > self.capacity {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"));
        }
        self.received.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_simulated_vitals_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vitals.edf");

    let table = standard_table(64, 250).unwrap();
    let simulator = VitalsSimulator::new(VitalsConfig {
        records: 30,
        ..Default::default()
    });
    let config = EncoderConfig::new("SIM-001", "Simulated bedside monitor");

    let (summary, sink) = encode(&table, config, simulator, FileSink::create(&path).unwrap()).unwrap();
    drop(sink);

    let record_bytes = table.record_bytes() as u64;
    assert_eq!(summary.records, 30);
    assert_eq!(summary.padded_samples, 0);
    assert_eq!(summary.bytes, 256 * 6 + 30 * record_bytes);

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len() as u64, summary.bytes);
    assert_eq!(&bytes[236..244], b"30      ");
    assert_eq!(&bytes[252..256], b"5   ");

    // SpO2 is the first sample of every record, stored in tenths of a percent
    for record in 0..30 {
        let offset = 256 * 6 + record * record_bytes as usize;
        let spo2 = i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        assert!((700..=1000).contains(&spo2), "record {} spo2 {}", record, spo2);
    }
}

#[test]
fn test_simulated_half_second_records() {
    let table = standard_table(32, 125).unwrap();
    let simulator = VitalsSimulator::new(VitalsConfig {
        records: 6,
        record_duration_seconds: 0.5,
        ..Default::default()
    });
    let config = EncoderConfig::default().with_record_duration(0.5);

    let (summary, sink) = encode(&table, config, simulator, StreamSink::new(Vec::new())).unwrap();
    assert_eq!(summary.records, 6);
    assert_eq!(summary.duration_seconds, 3.0);

    let bytes = sink.into_inner();
    assert_eq!(&bytes[236..244], b"6       ");
    assert_eq!(&bytes[244..252], b"0.5     ");
}

#[test]
fn test_simulated_vitals_to_stream() {
    let table = standard_table(32, 128).unwrap();
    let simulator = VitalsSimulator::new(VitalsConfig {
        records: 5,
        seed: 11,
        ..Default::default()
    });

    let (_, sink) = encode(&table, EncoderConfig::default(), simulator, StreamSink::new(Vec::new())).unwrap();
    let streamed = sink.into_inner();

    // the same data into a file sink gives the same bytes
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("same.edf");
    let simulator = VitalsSimulator::new(VitalsConfig {
        records: 5,
        seed: 11,
        ..Default::default()
    });
    encode(&table, EncoderConfig::default(), simulator, FileSink::create(&path).unwrap()).unwrap();

    assert_eq!(fs::read(&path).unwrap(), streamed);
}

#[test]
fn test_broken_stream_reports_error() {
    let table = standard_table(32, 128).unwrap();
    let simulator = VitalsSimulator::new(VitalsConfig {
        records: 10,
        ..Default::default()
    });
    let pipe = FlakyPipe {
        received: Vec::new(),
        capacity: 256 * 6 + 3 * table.record_bytes(),
    };

    let err = encode(&table, EncoderConfig::default(), simulator, StreamSink::new(pipe)).unwrap_err();
    assert!(matches!(err, EdfError::SinkWrite(_)));
}

#[test]
fn test_interrupted_source_keeps_count_consistent() {
    // The caller planned 10 records but the device stopped after 4
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interrupted.edf");
    let table = standard_table(16, 64).unwrap();

    let mut simulator = VitalsSimulator::new(VitalsConfig {
        records: 4,
        ..Default::default()
    });
    let mut sink = FileSink::create(&path).unwrap();
    sink.flush().unwrap();

    let config = EncoderConfig::default().with_planned_records(10);
    let (summary, _) = encode(&table, config, &mut simulator, sink).unwrap();
    assert_eq!(summary.records, 4);
    assert_eq!(simulator.remaining_records(), Some(0));

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[236..244], b"4       ");
    assert_eq!(bytes.len(), 256 * 6 + 4 * table.record_bytes());
}

#[test]
fn test_short_waveforms_are_padded() {
    let table = standard_table(8, 8).unwrap();
    let record = vec![
        SampleBatch::Scalar(97.0),
        SampleBatch::Scalar(70.0),
        SampleBatch::Waveform(vec![50.0; 6]),
        SampleBatch::Waveform(vec![0.0; 8]),
        SampleBatch::Scalar(15.0),
    ];
    let source = RecordedSource::new(vec![record; 2]);

    let (summary, sink) = encode(&table, EncoderConfig::default(), source, StreamSink::new(Vec::new())).unwrap();
    assert_eq!(summary.padded_samples, 4);

    let bytes = sink.into_inner();
    let first = &bytes[256 * 6..256 * 6 + table.record_bytes()];
    let samples: Vec<i16> = first
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    assert_eq!(samples[0], 970);
    assert_eq!(samples[1], 70);
    // pleth padding uses its digital minimum
    assert_eq!(&samples[8..10], &[i16::MIN, i16::MIN]);
    assert_eq!(samples[samples.len() - 1], 150);
}

#[test]
fn test_stream_sink_discard_is_terminal() {
    let mut sink = StreamSink::new(Vec::new());
    sink.write_all(b"0       ").unwrap();
    sink.discard().unwrap();
    assert!(sink.write_all(b"more").is_err());
}
