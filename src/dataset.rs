//! Input-batch conventions and the delimited text cache format.
//!
//! Descriptor extraction itself lives outside this crate: some loader turns
//! images into (vector, label) pairs, and the classifier only requires
//! uniform dimensionality per batch plus a label per vector. This module
//! holds the two things that loader and classifier agree on: the
//! enumeration of descriptor families (passed around as a plain value, never
//! ambient state) and the line-oriented text format used to cache extracted
//! batches between runs.

use std::fmt::Display;
use std::io::{BufRead, Write};
use std::str::FromStr;

use num_traits::Float;

use crate::common_types::FeatureVector;
use crate::distance::Distance;
use crate::error::ClassifyError;

/// The descriptor families a loader can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DescriptorKind {
    GrayscaleHistogram,
    EdgeMap,
    KeypointDescriptor,
    LocalBinaryPattern,
}

impl DescriptorKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GrayscaleHistogram => "grayscale-histogram",
            Self::EdgeMap => "edge-map",
            Self::KeypointDescriptor => "keypoint-descriptor",
            Self::LocalBinaryPattern => "local-binary-pattern",
        }
    }

    /// The metric this descriptor family is conventionally compared under:
    /// chi-square for the histogram-shaped kinds, L2 for the rest. A
    /// default, not a constraint.
    pub const fn default_metric(&self) -> Distance {
        match self {
            Self::GrayscaleHistogram | Self::LocalBinaryPattern => Distance::ChiSquare,
            Self::EdgeMap | Self::KeypointDescriptor => Distance::Euclidean,
        }
    }
}

/// Header written ahead of the records. Tolerated, not required, on read.
pub const HEADER: &str = "label,descriptor";

/// Writes one `label,c0,c1,...` line per record, preceded by [`HEADER`].
///
/// The schema is deliberately stable: label first, vector components after
/// it in fixed order, one record per line.
pub fn write_records<F, L, W>(
    writer: &mut W,
    records: &[FeatureVector<F, L>],
) -> Result<(), ClassifyError>
where
    F: Float + Display,
    L: Display,
    W: Write,
{
    writeln!(writer, "{HEADER}")?;
    for record in records {
        write!(writer, "{}", record.label)?;
        for component in &record.features {
            write!(writer, ",{component}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Reads records written by [`write_records`], failing on the first
/// malformed line. Blank lines and a leading header are tolerated.
pub fn read_records<F, R>(reader: R) -> Result<Vec<FeatureVector<F, String>>, ClassifyError>
where
    F: Float + FromStr,
    R: BufRead,
{
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if skippable(index, &line) {
            continue;
        }
        records.push(parse_record(&line, index + 1)?);
    }
    Ok(records)
}

/// Lenient variant of [`read_records`]: malformed lines are skipped and
/// counted instead of failing the load, so a cache with a few corrupt rows
/// still yields a usable batch. I/O errors still fail. Returns the parsed
/// records and the number of lines skipped.
pub fn read_records_lossy<F, R>(
    reader: R,
) -> Result<(Vec<FeatureVector<F, String>>, usize), ClassifyError>
where
    F: Float + FromStr,
    R: BufRead,
{
    let mut records = Vec::new();
    let mut skipped = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if skippable(index, &line) {
            continue;
        }
        match parse_record(&line, index + 1) {
            Ok(record) => records.push(record),
            Err(error) => {
                log::warn!("skipping record: {error}");
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

fn skippable(index: usize, line: &str) -> bool {
    line.trim().is_empty() || (index == 0 && line.trim().eq_ignore_ascii_case(HEADER))
}

fn parse_record<F>(line: &str, line_no: usize) -> Result<FeatureVector<F, String>, ClassifyError>
where
    F: Float + FromStr,
{
    let mut fields = line.split(',');
    // split always yields at least one field
    let label = fields.next().unwrap_or_default().trim();
    if label.is_empty() {
        return Err(ClassifyError::MalformedRecord {
            line: line_no,
            reason: "empty label".into(),
        });
    }

    let mut features = Vec::new();
    for field in fields {
        let component = field.trim().parse::<F>().map_err(|_| {
            ClassifyError::MalformedRecord {
                line: line_no,
                reason: format!("unparsable component {:?}", field.trim()),
            }
        })?;
        features.push(component);
    }
    if features.is_empty() {
        return Err(ClassifyError::MalformedRecord {
            line: line_no,
            reason: "record has no vector components".into(),
        });
    }

    Ok(FeatureVector::new(features, label.to_string()))
}
