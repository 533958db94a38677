use crate::error::{Result, SpliceError};
use crate::isoform::{Isoform, UNKNOWN_ACCESSION};
use crate::locus::{Locus, Strand};
use crate::splicing::{RawRow, SplicingEvent, float_column, nan_as_null};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifferentialExpression {
    pub log2_fold_change: f64,
    #[serde(with = "nan_as_null")]
    pub pvalue: f64,
    #[serde(with = "nan_as_null")]
    pub qvalue: f64,
}

impl DifferentialExpression {
    /// Reads one row of a 3D RNA-seq DE gene table (`log2FC`, `adj.pval`,
    /// optionally `pval`). A missing `pval` column leaves the p-value NaN.
    pub fn from_3drnaseq(row: &RawRow) -> Result<Self> {
        let pvalue = match row.contains_key("pval") {
            true => float_column(row, "pval")?,
            false => f64::NAN,
        };
        Ok(Self {
            log2_fold_change: float_column(row, "log2FC")?,
            pvalue,
            qvalue: float_column(row, "adj.pval")?,
        })
    }
}

/// One BED-like interval attached to a gene.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BedInterval {
    pub start: i64,
    pub end: i64,
    pub score: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    id: String,
    locus: Locus,
    #[serde(default)]
    isoforms: Vec<Isoform>,
    #[serde(default)]
    events: Vec<SplicingEvent>,
    #[serde(default)]
    differential_expression: Option<DifferentialExpression>,
    #[serde(default)]
    bed: BTreeMap<String, Vec<BedInterval>>,
}

impl Gene {
    pub fn new(id: impl Into<String>, locus: Locus) -> Self {
        Self {
            id: id.into(),
            locus,
            isoforms: vec![],
            events: vec![],
            differential_expression: None,
            bed: BTreeMap::new(),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline(always)]
    pub fn locus(&self) -> &Locus {
        &self.locus
    }

    pub fn name(&self) -> &str {
        self.locus.name()
    }

    pub fn start(&self) -> i64 {
        self.locus.start()
    }

    pub fn end(&self) -> i64 {
        self.locus.end()
    }

    pub fn strand(&self) -> Strand {
        self.locus.strand()
    }

    pub fn size(&self) -> i64 {
        self.locus.size()
    }

    pub fn isoforms(&self) -> &[Isoform] {
        &self.isoforms
    }

    /// Appends an isoform, widening the gene locus if the isoform lies outside it.
    pub fn add_isoform(&mut self, isoform: Isoform) {
        if !self.locus.contains(isoform.locus()) {
            self.locus = Locus::spanning(
                self.locus.name().to_string(),
                self.start().min(isoform.start()),
                self.end().max(isoform.end()),
                self.strand(),
            );
        }
        self.isoforms.push(isoform);
    }

    pub fn isoform_by_id(&self, id: &str) -> Option<&Isoform> {
        self.isoforms.iter().find(|i| i.id() == id)
    }

    pub fn has_isoform(&self, id: &str) -> bool {
        self.isoform_by_id(id).is_some()
    }

    /// Splicing events in registration order.
    pub fn events(&self) -> &[SplicingEvent] {
        &self.events
    }

    pub fn add_event(&mut self, event: SplicingEvent) {
        self.events.push(event);
    }

    pub fn is_spliced(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn differential_expression(&self) -> Option<&DifferentialExpression> {
        self.differential_expression.as_ref()
    }

    pub fn set_differential_expression(&mut self, de: DifferentialExpression) {
        self.differential_expression = Some(de);
    }

    /// Adds a BED-like row `[label, _, start, end, score, ...]`.
    pub fn add_bed_row(&mut self, raw: &[&str]) -> Result<()> {
        if raw.len() < 5 {
            return Err(SpliceError::MalformedLine(raw.join("\t")));
        }
        let field = |idx: usize, column: &str| -> Result<i64> {
            raw[idx].trim().parse::<i64>().map_err(|_| SpliceError::Parse {
                column: column.to_string(),
                value: raw[idx].to_string(),
            })
        };
        let interval = BedInterval {
            start: field(2, "start")?,
            end: field(3, "end")?,
            score: field(4, "score")?,
        };
        self.bed.entry(raw[0].to_string()).or_default().push(interval);
        Ok(())
    }

    /// BED intervals per source label. With a site, only intervals lying
    /// fully inside `[site.0, site.1]` are kept; labels are always present.
    pub fn bed(&self, site: Option<(i64, i64)>) -> BTreeMap<&str, Vec<BedInterval>> {
        self.bed
            .iter()
            .map(|(label, intervals)| {
                let kept = intervals
                    .iter()
                    .filter(|b| site.is_none_or(|(from, to)| b.start >= from && b.end <= to))
                    .copied()
                    .collect();
                (label.as_str(), kept)
            })
            .collect()
    }

    /// Union of the domain accessions of all isoforms, first-seen order,
    /// without duplicates and without the unknown placeholder.
    pub fn annotation_accessions(&self, source: Option<&str>) -> Vec<String> {
        self.isoforms
            .iter()
            .flat_map(|i| i.domain_accessions(source))
            .filter(|a| *a != UNKNOWN_ACCESSION)
            .unique()
            .map(str::to_string)
            .collect()
    }
}
