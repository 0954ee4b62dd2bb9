use std::env;

use chrono::NaiveDate;
use vitaledf::vitals::{standard_table, VitalsConfig, VitalsSimulator};
use vitaledf::{EncoderConfig, EncodingSession, FileSink, Result, SampleSource};

fn main() -> Result<()> {
    let path = env::args().nth(1).unwrap_or_else(|| "vitals_demo.edf".to_string());
    let seconds: u64 = env::args().nth(2).and_then(|s| s.parse().ok()).unwrap_or(120);

    let table = standard_table(64, 250)?;
    let start = NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(23, 15, 0))
        .unwrap_or_default();

    let config = EncoderConfig::new("SIM-001 Demo Patient", "Simulated overnight monitoring")
        .with_start(start)
        .with_planned_records(seconds)
        .with_annotations(true);

    let mut simulator = VitalsSimulator::new(VitalsConfig {
        records: seconds,
        ..Default::default()
    });

    let mut session = EncodingSession::open(table.clone(), config, FileSink::create_overwrite(&path)?)?;
    session.add_annotation(0.0, None, "Recording start")?;
    if seconds > 30 {
        session.add_annotation(30.0, Some(12.0), "Simulated desaturation")?;
    }

    while let Some(record) = simulator.next_record(&table) {
        session.write_record(&record)?;
    }
    let summary = session.close()?;

    println!("Wrote {}", path);
    println!("  signals: {}", table.len());
    for signal in &table {
        println!("    {:<8} {:>4} samples/record  [{}]", signal.label, signal.sample_rate, signal.physical_unit);
    }
    println!("  records: {}", summary.records);
    println!("  duration: {:.0}s", summary.duration_seconds);
    println!("  size: {} bytes", summary.bytes);
    Ok(())
}
