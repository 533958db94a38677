//! Expression lookups for control and treatment conditions.

use crate::error::{Result, SpliceError};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io::Read};

/// Mean TPM and the number of samples it was computed from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tpm {
    pub value: f64,
    pub count: f64,
}

impl Tpm {
    pub fn is_expressed(&self) -> bool {
        self.value > 0.0 && self.count > 0.0
    }
}

pub trait TpmSource {
    fn name(&self) -> &str;
    fn color(&self) -> &str;
    /// Transcript-level expression; unknown ids are unexpressed.
    fn tpm(&self, id: &str) -> Tpm;
    /// Gene-level expression; unknown ids are unexpressed.
    fn gene_tpm(&self, id: &str) -> Tpm;
}

pub trait ExpressionProject {
    fn control(&self) -> &dyn TpmSource;
    fn treatment(&self) -> &dyn TpmSource;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub transcripts: HashMap<String, Tpm>,
    #[serde(default)]
    pub genes: HashMap<String, Tpm>,
}

#[derive(Debug, Deserialize)]
struct TpmRow {
    id: String,
    tpm: f64,
    #[serde(default)]
    count: Option<f64>,
    #[serde(default)]
    level: Option<String>,
}

impl Condition {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            ..Default::default()
        }
    }

    /// Reads a tab separated table with `id`, `tpm` and optional `count`
    /// and `level` (`gene` or `transcript`, the default) columns.
    pub fn from_tsv<R: Read>(name: &str, color: &str, reader: R) -> Result<Self> {
        let mut ret = Self::new(name, color);
        let mut rdr = ReaderBuilder::new().delimiter(b'\t').from_reader(reader);
        for row in rdr.deserialize() {
            let row: TpmRow = row?;
            let tpm = Tpm {
                value: row.tpm,
                count: row.count.unwrap_or(1.0),
            };
            match row.level.as_deref().map(str::trim) {
                Some("gene") => ret.genes.insert(row.id, tpm),
                None | Some("") | Some("transcript") => ret.transcripts.insert(row.id, tpm),
                Some(other) => {
                    return Err(SpliceError::Parse {
                        column: "level".to_string(),
                        value: other.to_string(),
                    });
                }
            };
        }
        Ok(ret)
    }

    pub fn set_tpm(&mut self, id: impl Into<String>, value: f64, count: f64) {
        self.transcripts.insert(id.into(), Tpm { value, count });
    }
}

impl TpmSource for Condition {
    fn name(&self) -> &str {
        &self.name
    }

    fn color(&self) -> &str {
        &self.color
    }

    fn tpm(&self, id: &str) -> Tpm {
        self.transcripts.get(id).copied().unwrap_or_default()
    }

    fn gene_tpm(&self, id: &str) -> Tpm {
        self.genes.get(id).copied().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Project {
    pub control: Condition,
    pub treatment: Condition,
}

impl Project {
    pub fn new(control: Condition, treatment: Condition) -> Self {
        Self { control, treatment }
    }
}

impl ExpressionProject for Project {
    fn control(&self) -> &dyn TpmSource {
        &self.control
    }

    fn treatment(&self) -> &dyn TpmSource {
        &self.treatment
    }
}
