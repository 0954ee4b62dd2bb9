use chrono::{Datelike, Timelike};

use crate::config::EncoderConfig;
use crate::signal::{SignalDescriptor, SignalTable};
use crate::utils::{format_number, put_integer, put_number, put_text, to_ascii};

/// Size of the general header and of each per-signal header block
pub const HEADER_BLOCK_BYTES: usize = 256;

/// Byte offset of the "number of data records" field
pub const RECORD_COUNT_OFFSET: u64 = 236;

/// Width of the "number of data records" field
pub const RECORD_COUNT_WIDTH: usize = 8;

/// Bytes reserved for the annotation channel in every data record
pub const ANNOTATION_BYTES_PER_RECORD: usize = 120;

/// Label of the EDF+ annotation channel
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Name and byte width of one header field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub width: usize,
}

const fn field(name: &'static str, width: usize) -> Field {
    Field { name, width }
}

/// Layout of the 256-byte general header, in file order
pub const GENERAL_FIELDS: [Field; 10] = [
    field("version", 8),
    field("patient", 80),
    field("recording", 80),
    field("startdate", 8),
    field("starttime", 8),
    field("header_bytes", 8),
    field("reserved", 44),
    field("data_records", 8),
    field("record_duration", 8),
    field("signal_count", 4),
];

/// Layout of the per-signal header. Each field is written for all signals
/// before the next field starts.
pub const SIGNAL_FIELDS: [Field; 10] = [
    field("label", 16),
    field("transducer", 80),
    field("physical_dimension", 8),
    field("physical_min", 8),
    field("physical_max", 8),
    field("digital_min", 8),
    field("digital_max", 8),
    field("prefilter", 80),
    field("samples_per_record", 8),
    field("reserved", 32),
];

/// Value of the "number of data records" field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCount {
    Known(u64),
    /// Written as `-1`, the EDF value for a recording still in progress
    Unknown,
}

impl RecordCount {
    /// The padded 8-byte field
    pub fn field(self) -> [u8; RECORD_COUNT_WIDTH] {
        let mut bytes = [b' '; RECORD_COUNT_WIDTH];
        match self {
            RecordCount::Known(count) => put_text(&mut bytes, &count.to_string()),
            RecordCount::Unknown => put_integer(&mut bytes, -1),
        }
        bytes
    }
}

/// Header size in bytes for `signal_count` signals
pub fn header_size(signal_count: usize) -> usize {
    HEADER_BLOCK_BYTES * (signal_count + 1)
}

/// The descriptor written for the EDF+ annotation channel
pub fn annotation_signal() -> SignalDescriptor {
    SignalDescriptor {
        label: ANNOTATION_LABEL.to_string(),
        physical_unit: String::new(),
        sample_rate: (ANNOTATION_BYTES_PER_RECORD / 2) as u32,
        physical_min: -1.0,
        physical_max: 1.0,
        digital_min: i16::MIN as i32,
        digital_max: i16::MAX as i32,
        transducer: String::new(),
        prefilter: String::new(),
    }
}

/// Serializes the complete header: general block followed by the
/// per-signal block. The result is always `header_size(n)` bytes long,
/// where `n` includes the annotation channel when annotations are enabled.
///
/// ```rust
/// use vitaledf::{EncoderConfig, SignalDescriptor, SignalTable};
/// use vitaledf::header::{serialize_header, RecordCount};
///
/// let table = SignalTable::builder()
///     .signal(SignalDescriptor::new("SpO2", "%", 1).with_physical_range(0.0, 100.0))?
///     .build()?;
/// let header = serialize_header(&table, &EncoderConfig::default(), RecordCount::Known(3));
///
/// assert_eq!(header.len(), 512);
/// assert_eq!(&header[236..244], b"3       ");
/// # Ok::<(), vitaledf::EdfError>(())
/// ```
pub fn serialize_header(table: &SignalTable, config: &EncoderConfig, records: RecordCount) -> Vec<u8> {
    let annotation = config.annotations.then(annotation_signal);
    let signals: Vec<&SignalDescriptor> = table.iter().chain(annotation.as_ref()).collect();

    let mut header = vec![b' '; header_size(signals.len())];
    write_general_header(&mut header[..HEADER_BLOCK_BYTES], config, signals.len(), records);
    write_signal_headers(&mut header[HEADER_BLOCK_BYTES..], &signals);

    log::debug!(
        "serialized EDF header: {} signals, {} bytes, records {:?}",
        signals.len(),
        header.len(),
        records
    );
    header
}

fn write_general_header(main_header: &mut [u8], config: &EncoderConfig, signal_count: usize, records: RecordCount) {
    let start = config.start;

    // 版本 (8字节)
    put_text(&mut main_header[0..8], "0");

    // 患者与记录信息 (各80字节)
    if config.annotations {
        put_text(&mut main_header[8..88], &format!("X X X {}", subfield(&config.patient_name)));
        let recording = format!(
            "Startdate {:02}-{}-{:04} X X {}",
            start.day(),
            MONTHS[start.month0() as usize],
            start.year(),
            subfield(&config.recording_name)
        );
        put_text(&mut main_header[88..168], &recording);
    } else {
        put_text(&mut main_header[8..88], &config.patient_name);
        put_text(&mut main_header[88..168], &config.recording_name);
    }

    // 开始日期 (8字节) "dd.mm.yy"
    let date_str = format!("{:02}.{:02}.{:02}", start.day(), start.month(), start.year().rem_euclid(100));
    put_text(&mut main_header[168..176], &date_str);

    // 开始时间 (8字节) "hh.mm.ss"
    let time_str = format!("{:02}.{:02}.{:02}", start.hour(), start.minute(), start.second());
    put_text(&mut main_header[176..184], &time_str);

    // 头部大小 (8字节)
    put_integer(&mut main_header[184..192], header_size(signal_count) as i64);

    // 保留字段 (44字节)，EDF+ 标识
    put_text(&mut main_header[192..236], if config.annotations { "EDF+C" } else { "" });

    // 数据记录数 (8字节)
    main_header[236..244].copy_from_slice(&records.field());

    // 数据记录持续时间 (8字节)
    put_text(&mut main_header[244..252], &format_number(config.record_duration_seconds, 8));

    // 信号数 (4字节)
    put_integer(&mut main_header[252..256], signal_count as i64);
}

/// Writes one field for every signal, each `width` bytes, back to back
fn column<F>(out: &mut [u8], offset: &mut usize, signals: &[&SignalDescriptor], width: usize, write: F)
where
    F: Fn(&mut [u8], &SignalDescriptor),
{
    for &signal in signals {
        write(&mut out[*offset..*offset + width], signal);
        *offset += width;
    }
}

fn write_signal_headers(out: &mut [u8], signals: &[&SignalDescriptor]) {
    let mut offset = 0;

    // 1. 标签 (16字节 × 信号数)
    column(out, &mut offset, signals, 16, |f, s| put_text(f, &s.label));
    // 2. 传感器 (80字节 × 信号数)
    column(out, &mut offset, signals, 80, |f, s| put_text(f, &s.transducer));
    // 3. 物理单位 (8字节 × 信号数)
    column(out, &mut offset, signals, 8, |f, s| put_text(f, &s.physical_unit));
    // 4-5. 物理最小值/最大值 (8字节 × 信号数)
    column(out, &mut offset, signals, 8, |f, s| put_number(f, s.physical_min));
    column(out, &mut offset, signals, 8, |f, s| put_number(f, s.physical_max));
    // 6-7. 数字最小值/最大值 (8字节 × 信号数)
    column(out, &mut offset, signals, 8, |f, s| put_integer(f, s.digital_min as i64));
    column(out, &mut offset, signals, 8, |f, s| put_integer(f, s.digital_max as i64));
    // 8. 预滤波 (80字节 × 信号数)
    column(out, &mut offset, signals, 80, |f, s| put_text(f, &s.prefilter));
    // 9. 每记录样本数 (8字节 × 信号数)
    column(out, &mut offset, signals, 8, |f, s| put_integer(f, s.sample_rate as i64));
    // 10. 保留字段 (32字节 × 信号数)
    column(out, &mut offset, signals, 32, |f, _| f.fill(b' '));

    debug_assert_eq!(offset, out.len());
}

// EDF+ 子字段内不允许空格
fn subfield(value: &str) -> String {
    let value = to_ascii(value.trim());
    if value.is_empty() {
        "X".to_string()
    } else {
        value.replace(' ', "_")
    }
}
