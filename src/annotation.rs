use std::collections::VecDeque;

use crate::error::{EdfError, Result};
use crate::header::ANNOTATION_BYTES_PER_RECORD;
use crate::utils::format_tal_seconds;
use crate::{EDFLIB_MAX_ANNOTATION_LEN, EDFLIB_TIME_DIMENSION};

/// Maximum effective length for annotation descriptions in a TAL
///
/// Longer descriptions are truncated at a character boundary when the
/// record is written.
pub const MAX_TAL_DESCRIPTION_LEN: usize = 40;

/// An event attached to the recording timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Onset since recording start, in 100 ns units
    pub onset: i64,
    /// Duration in 100 ns units, if known
    pub duration: Option<i64>,
    pub description: String,
}

impl Annotation {
    /// Creates an annotation from seconds
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidAnnotation` - negative or non-finite onset or
    ///   duration, empty or overlong description
    pub fn new(onset_seconds: f64, duration_seconds: Option<f64>, description: &str) -> Result<Self> {
        if !onset_seconds.is_finite() || onset_seconds < 0.0 {
            return Err(EdfError::InvalidAnnotation("Annotation onset cannot be negative".to_string()));
        }
        if let Some(duration) = duration_seconds {
            if !duration.is_finite() || duration < 0.0 {
                return Err(EdfError::InvalidAnnotation("Annotation duration cannot be negative".to_string()));
            }
        }
        if description.trim().is_empty() {
            return Err(EdfError::InvalidAnnotation("Annotation description cannot be empty".to_string()));
        }
        if description.len() > EDFLIB_MAX_ANNOTATION_LEN {
            return Err(EdfError::InvalidAnnotation(format!(
                "Annotation description too long (max {} bytes)",
                EDFLIB_MAX_ANNOTATION_LEN
            )));
        }

        Ok(Annotation {
            onset: to_ticks(onset_seconds),
            duration: duration_seconds.map(to_ticks),
            description: description.to_string(),
        })
    }

    pub fn onset_seconds(&self) -> f64 {
        self.onset as f64 / EDFLIB_TIME_DIMENSION as f64
    }

    /// Appends this annotation as a TAL to `tal`, if the structure fits
    /// into `limit` bytes. The description is shortened to fit.
    fn append_tal(&self, tal: &mut Vec<u8>, limit: usize) -> bool {
        let onset = format_tal_seconds(self.onset_seconds());
        let duration = self
            .duration
            .map(|d| format_tal_seconds(d as f64 / EDFLIB_TIME_DIMENSION as f64));

        // '+', onset, [\x15 duration], \x14, description, \x14, \x00
        let mut structure = 1 + onset.len() + 3;
        if let Some(duration) = &duration {
            structure += 1 + duration.len();
        }
        if tal.len() + structure + 1 > limit {
            return false;
        }

        tal.push(b'+');
        tal.extend_from_slice(onset.as_bytes());
        if let Some(duration) = &duration {
            tal.push(0x15);
            tal.extend_from_slice(duration.as_bytes());
        }
        tal.push(0x14);

        let room = MAX_TAL_DESCRIPTION_LEN.min(limit - tal.len() - 2);
        tal.extend_from_slice(truncate_utf8(&self.description, room).as_bytes());

        tal.push(0x14);
        tal.push(0x00);
        true
    }
}

pub(crate) fn to_ticks(seconds: f64) -> i64 {
    (seconds * EDFLIB_TIME_DIMENSION as f64).round() as i64
}

fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Annotations of one session, rendered record by record
///
/// Pending annotations are kept sorted by onset. Rendering a record takes
/// the ones that fall into it off the front, so each annotation is looked
/// at once.
#[derive(Debug, Default)]
pub struct AnnotationList {
    pending: VecDeque<Annotation>,
    written: usize,
    dropped: usize,
}

impl AnnotationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, annotation: Annotation) {
        let position = self.pending.partition_point(|a| a.onset <= annotation.onset);
        self.pending.insert(position, annotation);
    }

    /// Number of annotations accepted so far
    pub fn len(&self) -> usize {
        self.pending.len() + self.written + self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Annotations not yet rendered into any record, in onset order
    pub fn pending(&self) -> impl Iterator<Item = &Annotation> {
        self.pending.iter()
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Annotations that did not fit into their record
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Renders the annotation channel of data record `record_index`
    ///
    /// The block starts with the time-keeping TAL `+<onset>\x14\x14\x00`
    /// and continues with every pending annotation whose onset falls
    /// before the end of the record. Annotations that do not fit, or that
    /// precede the record, are dropped with a warning. The remainder is
    /// zero-filled.
    pub fn tal_for_record(&mut self, record_index: u64, record_duration: i64) -> [u8; ANNOTATION_BYTES_PER_RECORD] {
        let record_start = record_index as i64 * record_duration;
        let record_end = record_start + record_duration;

        let mut tal = Vec::with_capacity(ANNOTATION_BYTES_PER_RECORD);
        tal.push(b'+');
        tal.extend_from_slice(format_tal_seconds(record_start as f64 / EDFLIB_TIME_DIMENSION as f64).as_bytes());
        tal.extend_from_slice(&[0x14, 0x14, 0x00]);

        while let Some(annotation) = self.pending.pop_front() {
            if annotation.onset >= record_end {
                self.pending.push_front(annotation);
                break;
            }
            if annotation.onset < record_start {
                log::warn!(
                    "annotation '{}' at {}s precedes data record {}, dropped",
                    annotation.description,
                    annotation.onset_seconds(),
                    record_index
                );
                self.dropped += 1;
            } else if annotation.append_tal(&mut tal, ANNOTATION_BYTES_PER_RECORD) {
                self.written += 1;
            } else {
                log::warn!(
                    "annotation '{}' at {}s does not fit into data record {}, dropped",
                    annotation.description,
                    annotation.onset_seconds(),
                    record_index
                );
                self.dropped += 1;
            }
        }

        let mut block = [0u8; ANNOTATION_BYTES_PER_RECORD];
        block[..tal.len()].copy_from_slice(&tal);
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_SECOND: i64 = EDFLIB_TIME_DIMENSION;

    fn text(block: &[u8]) -> String {
        String::from_utf8_lossy(block).trim_end_matches('\0').to_string()
    }

    #[test]
    fn test_annotation_validation() {
        assert!(Annotation::new(1.0, None, "Desaturation").is_ok());
        assert!(Annotation::new(-1.0, None, "x").is_err());
        assert!(Annotation::new(1.0, Some(-0.5), "x").is_err());
        assert!(Annotation::new(1.0, None, "   ").is_err());
        assert!(Annotation::new(f64::NAN, None, "x").is_err());
        assert!(Annotation::new(1.0, None, &"a".repeat(513)).is_err());
    }

    #[test]
    fn test_timekeeping_only() {
        let mut list = AnnotationList::new();
        let block = list.tal_for_record(0, ONE_SECOND);
        assert_eq!(&block[..5], b"+0\x14\x14\x00");
        assert!(block[5..].iter().all(|&b| b == 0));

        let block = list.tal_for_record(7, ONE_SECOND / 2);
        assert_eq!(text(&block), "+3.5\x14\x14");
    }

    #[test]
    fn test_annotations_placed_in_their_record() {
        let mut list = AnnotationList::new();
        list.push(Annotation::new(0.25, None, "Lights out").unwrap());
        list.push(Annotation::new(1.5, Some(2.0), "Desaturation").unwrap());

        let first = text(&list.tal_for_record(0, ONE_SECOND));
        assert_eq!(first, "+0\x14\x14\0+0.25\x14Lights out\x14");

        let second = text(&list.tal_for_record(1, ONE_SECOND));
        assert_eq!(second, "+1\x14\x14\0+1.5\x152\x14Desaturation\x14");

        let third = text(&list.tal_for_record(2, ONE_SECOND));
        assert_eq!(third, "+2\x14\x14");
        assert_eq!(list.written(), 2);
        assert_eq!(list.pending().count(), 0);
    }

    #[test]
    fn test_out_of_order_pushes_rendered_in_onset_order() {
        let mut list = AnnotationList::new();
        list.push(Annotation::new(2.5, None, "late").unwrap());
        list.push(Annotation::new(0.5, None, "b").unwrap());
        list.push(Annotation::new(0.5, None, "c").unwrap());
        list.push(Annotation::new(0.25, None, "a").unwrap());

        let first = text(&list.tal_for_record(0, ONE_SECOND));
        assert_eq!(first, "+0\x14\x14\0+0.25\x14a\x14\0+0.5\x14b\x14\0+0.5\x14c\x14");
        assert_eq!(list.pending().map(|a| a.description.as_str()).collect::<Vec<_>>(), ["late"]);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_annotation_before_record_dropped() {
        let mut list = AnnotationList::new();
        list.push(Annotation::new(0.5, None, "missed").unwrap());
        let block = text(&list.tal_for_record(3, ONE_SECOND));
        assert_eq!(block, "+3\x14\x14");
        assert_eq!(list.dropped(), 1);
        assert_eq!(list.written(), 0);
    }

    #[test]
    fn test_long_description_truncated() {
        let mut list = AnnotationList::new();
        list.push(Annotation::new(0.0, None, &"x".repeat(100)).unwrap());
        let block = list.tal_for_record(0, ONE_SECOND);
        let expected = format!("+0\x14\x14\0+0\x14{}\x14", "x".repeat(MAX_TAL_DESCRIPTION_LEN));
        assert_eq!(text(&block), expected);
    }

    #[test]
    fn test_overflowing_annotations_dropped() {
        let mut list = AnnotationList::new();
        for i in 0..10 {
            list.push(Annotation::new(0.1 * i as f64, None, &format!("event number {}", i)).unwrap());
        }
        let block = list.tal_for_record(0, ONE_SECOND);
        assert_eq!(block.len(), ANNOTATION_BYTES_PER_RECORD);
        assert_eq!(*block.last().unwrap(), 0);
        assert!(text(&block).contains("event number 0"));
        assert!(!text(&block).contains("event number 9"));
        assert_eq!(list.written() + list.dropped(), 10);
        assert!(list.dropped() > 0);
        assert_eq!(list.pending().count(), 0);
    }

    #[test]
    fn test_truncate_utf8_respects_boundaries() {
        assert_eq!(truncate_utf8("héllo", 2), "h");
        assert_eq!(truncate_utf8("héllo", 3), "hé");
        assert_eq!(truncate_utf8("abc", 10), "abc");
    }
}
