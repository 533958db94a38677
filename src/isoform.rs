//! Transcript models: exon/intron structure, coding sequence and protein
//! domain annotations.

use crate::error::Result;
use crate::locus::{Locus, Strand, merge_ranges};
use serde::{Deserialize, Serialize};

/// Accession used by annotation sources when the domain could not be identified.
pub const UNKNOWN_ACCESSION: &str = "?";

/// A protein domain hit, positioned in 1-based amino acid coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainAnnotation {
    pub accession: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub description: String,
    pub protein_start: i64,
    pub protein_end: i64,
}

impl DomainAnnotation {
    /// Projects the domain onto the genome through the isoform's coding
    /// sequence. One locus is produced per CDS segment the domain touches.
    pub fn to_loci(&self, isoform: &Isoform) -> Vec<Locus> {
        let Some(cds) = isoform.cds() else {
            return vec![];
        };
        if self.protein_end < self.protein_start || self.protein_start < 1 {
            return vec![];
        }
        let nt_from = (self.protein_start - 1) * 3;
        let nt_to = self.protein_end * 3 - 1;
        let strand = isoform.strand();

        let mut segments: Vec<&Locus> = cds.iter().collect();
        segments.sort_by_key(|l| l.start());
        if strand.is_reverse() {
            segments.reverse();
        }

        let mut ret = vec![];
        let mut offset = 0;
        for segment in segments {
            let seg_from = offset;
            let seg_to = offset + segment.size() - 1;
            offset += segment.size();
            let lo = nt_from.max(seg_from);
            let hi = nt_to.min(seg_to);
            if lo > hi {
                continue;
            }
            let (start, end) = match strand {
                Strand::Forward => (
                    segment.start() + (lo - seg_from),
                    segment.start() + (hi - seg_from),
                ),
                Strand::Reverse => (
                    segment.end() - (hi - seg_from),
                    segment.end() - (lo - seg_from),
                ),
            };
            ret.push(Locus::spanning(self.accession.clone(), start, end, strand));
        }
        ret
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Isoform {
    id: String,
    locus: Locus,
    #[serde(default)]
    mrna: Option<String>,
    #[serde(default)]
    exons: Vec<Locus>,
    #[serde(default)]
    introns: Vec<Locus>,
    #[serde(default)]
    cds: Option<Vec<Locus>>,
    #[serde(default)]
    domains: Vec<DomainAnnotation>,
}

impl Isoform {
    pub fn new(id: impl Into<String>, locus: Locus) -> Self {
        Self {
            id: id.into(),
            locus,
            mrna: None,
            exons: vec![],
            introns: vec![],
            cds: None,
            domains: vec![],
        }
    }

    /// Builds an isoform from exon boundaries; the isoform locus spans all
    /// exons and introns are derived from the gaps between them.
    pub fn from_exons(id: impl Into<String>, strand: Strand, exons: &[(i64, i64)]) -> Result<Self> {
        let id = id.into();
        let merged = merge_ranges(exons);
        let start = merged.first().map(|r| r.0).unwrap_or(0);
        let end = merged.last().map(|r| r.1).unwrap_or(0);
        let mut ret = Self::new(id.clone(), Locus::new(id, start, end, strand)?);
        ret.set_exons(&merged)?;
        Ok(ret)
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

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.locus.set_name(name);
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

    /// Key used for expression lookups; falls back to the isoform id.
    pub fn mrna(&self) -> &str {
        self.mrna.as_deref().unwrap_or(&self.id)
    }

    pub fn set_mrna(&mut self, accession: impl Into<String>) {
        self.mrna = Some(accession.into());
    }

    pub fn exons(&self) -> &[Locus] {
        &self.exons
    }

    pub fn introns(&self) -> &[Locus] {
        &self.introns
    }

    /// Replaces the exon structure and recomputes introns from the gaps.
    pub fn set_exons(&mut self, ranges: &[(i64, i64)]) -> Result<()> {
        let strand = self.strand();
        let mut sorted = ranges.to_vec();
        sorted.sort_unstable();
        self.exons = sorted
            .iter()
            .enumerate()
            .map(|(n, (start, end))| {
                Locus::new(format!("{} exon {}", self.id, n + 1), *start, *end, strand)
            })
            .collect::<Result<Vec<_>>>()?;
        self.introns = sorted
            .windows(2)
            .filter(|w| w[1].0 - w[0].1 > 1)
            .enumerate()
            .map(|(n, w)| {
                let name = format!("{} intron {}", self.id, n + 1);
                Locus::new(name, w[0].1 + 1, w[1].0 - 1, strand)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    pub fn has_cds(&self) -> bool {
        self.cds.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn cds(&self) -> Option<&[Locus]> {
        self.cds.as_deref()
    }

    pub fn set_cds(&mut self, ranges: &[(i64, i64)]) -> Result<()> {
        let strand = self.strand();
        let mut sorted = ranges.to_vec();
        sorted.sort_unstable();
        let cds = sorted
            .iter()
            .map(|(start, end)| Locus::new(format!("{} CDS", self.id), *start, *end, strand))
            .collect::<Result<Vec<_>>>()?;
        self.cds = if cds.is_empty() { None } else { Some(cds) };
        Ok(())
    }

    pub fn domains(&self) -> &[DomainAnnotation] {
        &self.domains
    }

    pub fn add_domain(&mut self, domain: DomainAnnotation) {
        self.domains.push(domain);
    }

    /// Domain accessions in annotation order, optionally restricted to one
    /// annotation source. May contain duplicates and [`UNKNOWN_ACCESSION`].
    pub fn domain_accessions(&self, source: Option<&str>) -> Vec<&str> {
        self.domains
            .iter()
            .filter(|d| source.is_none_or(|s| d.source == s))
            .map(|d| d.accession.as_str())
            .collect()
    }
}
