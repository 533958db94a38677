//! Genomic intervals with strand orientation.

use crate::error::{Result, SpliceError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl Strand {
    pub fn is_forward(&self) -> bool {
        matches!(self, Strand::Forward)
    }

    pub fn is_reverse(&self) -> bool {
        !self.is_forward()
    }
}

impl FromStr for Strand {
    type Err = SpliceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "+" | "1" | "+1" | "true" | "forward" => Ok(Strand::Forward),
            "-" | "-1" | "false" | "reverse" => Ok(Strand::Reverse),
            other => Err(SpliceError::Parse {
                column: "strand".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// Closed interval `[start, end]` in base pairs. `start <= end` always holds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLocus")]
pub struct Locus {
    name: String,
    start: i64,
    end: i64,
    strand: Strand,
}

#[derive(Deserialize)]
struct RawLocus {
    #[serde(default)]
    name: String,
    start: i64,
    end: i64,
    #[serde(default)]
    strand: Strand,
}

impl TryFrom<RawLocus> for Locus {
    type Error = SpliceError;

    fn try_from(raw: RawLocus) -> Result<Self> {
        Locus::new(raw.name, raw.start, raw.end, raw.strand)
    }
}

impl Locus {
    pub fn new(name: impl Into<String>, start: i64, end: i64, strand: Strand) -> Result<Self> {
        let name = name.into();
        if start > end {
            return Err(SpliceError::InvalidLocus { name, start, end });
        }
        Ok(Self {
            name,
            start,
            end,
            strand,
        })
    }

    /// Builds a locus from two boundaries given in any order.
    pub fn spanning(name: impl Into<String>, a: i64, b: i64, strand: Strand) -> Self {
        Self {
            name: name.into(),
            start: a.min(b),
            end: a.max(b),
            strand,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn start(&self) -> i64 {
        self.start
    }

    #[inline(always)]
    pub fn end(&self) -> i64 {
        self.end
    }

    #[inline(always)]
    pub fn strand(&self) -> Strand {
        self.strand
    }

    /// Number of bases covered, inclusive of both ends.
    pub fn size(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, other: &Locus) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Locus) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}..{}({})", self.name, self.start, self.end, self.strand)
    }
}

/// Merges overlapping or adjacent intervals; input order does not matter.
pub fn merge_ranges(ranges: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut sorted = ranges.to_vec();
    sorted.sort_unstable();
    let mut out: Vec<(i64, i64)> = Vec::with_capacity(sorted.len());
    for (start, end) in sorted {
        match out.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => out.push((start, end)),
        }
    }
    out
}
