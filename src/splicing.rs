//! Alternative-splicing events: span derivation per event type, isoform
//! pairing and the compact share tuple.
//!
//! rMATS events carry a genomic span (the `site`) derived from the raw
//! coordinate columns of their table:
//!
//! | type      | span                                                     |
//! |-----------|----------------------------------------------------------|
//! | RI        | `downstreamEE` .. `upstreamES`                           |
//! | SE        | `exonStart_0base` .. `exonEnd`                           |
//! | A3SS/A5SS | long/short exon boundaries, whichever differ             |
//!
//! 3D RNA-seq events have no span; their isoform pairs come from
//! expression switches between control and treatment.

use crate::error::{Result, SpliceError};
use crate::expression::{ExpressionProject, TpmSource};
use crate::gene::Gene;
use crate::isoform::Isoform;
use crate::locus::Locus;
use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// A raw table row, keyed by column name.
pub type RawRow = BTreeMap<String, String>;

/// Isoforms that are tested together against an event. Normally a pair;
/// genes with fewer than two isoforms yield a single shorter group.
pub type IsoformGroup<'a> = Vec<&'a Isoform>;

pub const SITE_START: &str = "AS_SITE_START";
pub const SITE_END: &str = "AS_SITE_END";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Evidence {
    #[serde(rename = "rMATS")]
    Rmats,
    #[serde(rename = "3DRNASeq")]
    ThreeDRnaSeq,
}

impl Evidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Evidence::Rmats => "rMATS",
            Evidence::ThreeDRnaSeq => "3DRNASeq",
        }
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    RetainedIntron,
    SkippedExon,
    Alternative3ss,
    Alternative5ss,
    ThreeDRnaSeq,
}

impl EventKind {
    pub fn code(&self) -> &'static str {
        match self {
            EventKind::RetainedIntron => "RI",
            EventKind::SkippedExon => "SE",
            EventKind::Alternative3ss => "A3SS",
            EventKind::Alternative5ss => "A5SS",
            EventKind::ThreeDRnaSeq => "3DRNASeq",
        }
    }

    pub fn evidence(&self) -> Evidence {
        match self {
            EventKind::ThreeDRnaSeq => Evidence::ThreeDRnaSeq,
            _ => Evidence::Rmats,
        }
    }
}

impl FromStr for EventKind {
    type Err = SpliceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RI" => Ok(EventKind::RetainedIntron),
            "SE" => Ok(EventKind::SkippedExon),
            "A3SS" => Ok(EventKind::Alternative3ss),
            "A5SS" => Ok(EventKind::Alternative5ss),
            "3DRNASEQ" => Ok(EventKind::ThreeDRnaSeq),
            other => Err(SpliceError::UnknownEventType(other.to_string())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Genomic span of an rMATS event plus the raw attributes kept for sharing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RmatsSite {
    pub start: i64,
    pub end: i64,
    /// Inner boundary of an A3SS/A5SS event.
    #[serde(default)]
    pub splice_point: Option<i64>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub upstream_ee: Option<i64>,
    #[serde(default)]
    pub downstream_es: Option<i64>,
    #[serde(default)]
    pub ptc: Option<String>,
}

impl RmatsSite {
    pub fn impact(&self) -> i64 {
        (self.end - self.start).abs() + 1
    }

    fn contains(&self, locus: &Locus) -> bool {
        self.start <= locus.start() && locus.end() <= self.end
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplicingEvent {
    kind: EventKind,
    #[serde(with = "nan_as_null")]
    delta: f64,
    #[serde(with = "nan_as_null")]
    significance: f64,
    #[serde(default)]
    site: Option<RmatsSite>,
    #[serde(default)]
    extras: BTreeMap<String, String>,
}

const RMATS_CONSUMED: &[&str] = &[
    "IncLevelDifference",
    "FDR",
    "ID",
    "upstreamEE",
    "downstreamES",
    "ptc",
    SITE_START,
    SITE_END,
];

impl SplicingEvent {
    /// Builds an rMATS event from one row of a `<TYPE>.MATS.*.txt` table.
    pub fn from_rmats(row: &RawRow, kind: EventKind) -> Result<Self> {
        if kind == EventKind::ThreeDRnaSeq {
            return Err(SpliceError::UnknownEventType(kind.code().to_string()));
        }
        let delta = float_column(row, "IncLevelDifference")?;
        let significance = float_column(row, "FDR")?;

        let (start, end, splice_point) = match (row.get(SITE_START), row.get(SITE_END)) {
            (Some(_), Some(_)) => {
                let a = int_column(row, SITE_START)?;
                let b = int_column(row, SITE_END)?;
                (a.min(b), a.max(b), None)
            }
            _ => derive_span(row, kind)?,
        };

        let site = RmatsSite {
            start,
            end,
            splice_point,
            id: optional_text(row, "ID"),
            upstream_ee: optional_int(row, "upstreamEE")?,
            downstream_es: optional_int(row, "downstreamES")?,
            ptc: optional_text(row, "ptc"),
        };

        let extras = row
            .iter()
            .filter(|(k, _)| !RMATS_CONSUMED.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            kind,
            delta,
            significance,
            site: Some(site),
            extras,
        })
    }

    /// Builds an event from one row of a 3D RNA-seq DAS table.
    pub fn from_3drnaseq(row: &RawRow) -> Result<Self> {
        let delta = float_column(row, "maxdeltaPS")?;
        let significance = float_column(row, "adj.pval")?;
        let extras = row
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "maxdeltaPS" | "adj.pval"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self {
            kind: EventKind::ThreeDRnaSeq,
            delta,
            significance,
            site: None,
            extras,
        })
    }

    #[inline(always)]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn evidence(&self) -> Evidence {
        self.kind.evidence()
    }

    #[inline(always)]
    pub fn delta(&self) -> f64 {
        self.delta
    }

    #[inline(always)]
    pub fn significance(&self) -> f64 {
        self.significance
    }

    pub fn rmats_site(&self) -> Option<&RmatsSite> {
        self.site.as_ref()
    }

    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }

    pub fn has_maser(&self) -> bool {
        self.extra("MASER")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "na"))
            .unwrap_or(false)
    }

    /// Genomic span `[start, end]` of the event.
    pub fn site(&self) -> Option<(i64, i64)> {
        self.site.as_ref().map(|s| (s.start, s.end))
    }

    /// Span relative to the gene start.
    pub fn site_relative(&self, gene: &Gene) -> Option<(i64, i64)> {
        self.site().map(|(a, b)| (a - gene.start(), b - gene.start()))
    }

    /// `|end - start| + 1`; `None` for events without a span.
    pub fn impact(&self) -> Option<i64> {
        self.site.as_ref().map(RmatsSite::impact)
    }

    /// Splice point of an A3SS/A5SS event, genomic or relative to `gene`.
    pub fn splice_point(&self, relative_to: Option<&Gene>) -> Option<i64> {
        let pb = self.site.as_ref()?.splice_point?;
        Some(pb - relative_to.map(Gene::start).unwrap_or(0))
    }

    /// All unordered isoform pairs when the gene has at least three
    /// isoforms, otherwise one group holding every isoform.
    pub fn candidate_pairs<'g>(&self, gene: &'g Gene) -> Vec<IsoformGroup<'g>> {
        let isoforms = gene.isoforms();
        if isoforms.is_empty() {
            return vec![];
        }
        if isoforms.len() < 3 {
            return vec![isoforms.iter().collect()];
        }
        isoforms
            .iter()
            .array_combinations::<2>()
            .map(Vec::from)
            .collect()
    }

    /// Isoform pairs consistent with this event.
    ///
    /// RI and SE pairs must show the retained intron / skipped exon inside
    /// the event span; A3SS and A5SS keep every candidate; 3D RNA-seq pairs
    /// must switch expression order between control and treatment and need
    /// a `project`.
    pub fn isoform_pairs<'g>(
        &self,
        gene: &'g Gene,
        project: Option<&dyn ExpressionProject>,
    ) -> Vec<IsoformGroup<'g>> {
        let candidates = self.candidate_pairs(gene);
        match self.kind {
            EventKind::Alternative3ss | EventKind::Alternative5ss => candidates,
            EventKind::RetainedIntron => self.filter_structural(candidates, retains_intron),
            EventKind::SkippedExon => self.filter_structural(candidates, skips_exon),
            EventKind::ThreeDRnaSeq => match project {
                Some(project) => switching_pairs(candidates, project),
                None => vec![],
            },
        }
    }

    fn filter_structural<'g>(
        &self,
        candidates: Vec<IsoformGroup<'g>>,
        test: fn(&RmatsSite, &Isoform, &Isoform) -> bool,
    ) -> Vec<IsoformGroup<'g>> {
        let Some(site) = self.site.as_ref() else {
            warn!("{} event without a site, no isoform pairs", self.kind);
            return vec![];
        };
        candidates
            .into_iter()
            .filter(|group| match group.as_slice() {
                [a, b] => test(site, a, b) || test(site, b, a),
                other => {
                    warn!(
                        "Failed to test {} event against isoforms [{}]",
                        self.kind,
                        other.iter().map(|i| i.id()).collect::<Vec<_>>().join(", ")
                    );
                    false
                }
            })
            .collect()
    }

    /// For each isoform expressed in control, the isoforms expressed in
    /// treatment at a different level. Isoforms without partners are left out.
    pub fn switch_candidates(
        &self,
        gene: &Gene,
        project: &dyn ExpressionProject,
    ) -> Vec<(String, Vec<String>)> {
        let expressed = |source: &dyn TpmSource| {
            gene.isoforms()
                .iter()
                .map(|iso| (iso.name().to_string(), source.tpm(iso.mrna())))
                .filter(|(_, tpm)| tpm.is_expressed())
                .collect::<Vec<_>>()
        };
        let control = expressed(project.control());
        let treatment = expressed(project.treatment());
        control
            .iter()
            .map(|(name, c)| {
                let partners = treatment
                    .iter()
                    .filter(|(other, t)| other != name && t.value != c.value)
                    .map(|(other, _)| other.clone())
                    .collect::<Vec<_>>();
                (name.clone(), partners)
            })
            .filter(|(_, partners)| !partners.is_empty())
            .collect()
    }

    /// Compact tuple form: `[evidence, delta, significance]`, followed for
    /// rMATS by `[type, site_start, site_end, id, upstreamEE, downstreamES, ptc]`.
    pub fn share(&self) -> Vec<Value> {
        let mut ret = vec![
            json!(self.evidence().as_str()),
            json!(self.delta),
            json!(self.significance),
        ];
        if let Some(site) = &self.site {
            ret.extend([
                json!(self.kind.code()),
                json!(site.start),
                json!(site.end),
                json!(site.id),
                json!(site.upstream_ee),
                json!(site.downstream_es),
                json!(site.ptc),
            ]);
        }
        ret
    }

    pub fn from_share(share: &[Value]) -> Result<Self> {
        let evidence = share
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| SpliceError::InvalidShare("missing evidence".to_string()))?;
        let delta = share_f64(share, 1)?;
        let significance = share_f64(share, 2)?;
        match evidence {
            "3DRNASeq" => Ok(Self {
                kind: EventKind::ThreeDRnaSeq,
                delta,
                significance,
                site: None,
                extras: BTreeMap::new(),
            }),
            "rMATS" => {
                if share.len() < 10 {
                    return Err(SpliceError::InvalidShare(format!(
                        "rMATS share needs 10 fields, got {}",
                        share.len()
                    )));
                }
                let kind: EventKind = share[3]
                    .as_str()
                    .ok_or_else(|| SpliceError::InvalidShare("missing event type".to_string()))?
                    .parse()?;
                let a = share_i64(share, 4)?
                    .ok_or_else(|| SpliceError::InvalidShare("missing site start".to_string()))?;
                let b = share_i64(share, 5)?
                    .ok_or_else(|| SpliceError::InvalidShare("missing site end".to_string()))?;
                Ok(Self {
                    kind,
                    delta,
                    significance,
                    site: Some(RmatsSite {
                        start: a.min(b),
                        end: a.max(b),
                        splice_point: None,
                        id: share_text(&share[6]),
                        upstream_ee: share_i64(share, 7)?,
                        downstream_es: share_i64(share, 8)?,
                        ptc: share_text(&share[9]),
                    }),
                    extras: BTreeMap::new(),
                })
            }
            other => Err(SpliceError::InvalidShare(format!("unknown evidence '{other}'"))),
        }
    }
}

/// JSON has no NaN; missing statistics travel as `null`.
pub(crate) mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

fn derive_span(row: &RawRow, kind: EventKind) -> Result<(i64, i64, Option<i64>)> {
    Ok(match kind {
        EventKind::RetainedIntron => {
            let a = int_column(row, "downstreamEE")?;
            let b = int_column(row, "upstreamES")?;
            (a.min(b), a.max(b), None)
        }
        EventKind::SkippedExon => {
            let a = int_column(row, "exonStart_0base")?;
            let b = int_column(row, "exonEnd")?;
            (a.min(b), a.max(b), None)
        }
        _ => {
            let a = int_column(row, "longExonStart_0base")?;
            let b = int_column(row, "longExonEnd")?;
            let c = int_column(row, "shortES")?;
            let d = int_column(row, "shortEE")?;
            let start_differs = a != c;
            let end_differs = b != d;
            if start_differs && end_differs {
                warn!(
                    "duplicate AS event: {} {} long {a}-{b} short {c}-{d}",
                    kind,
                    row.get("ID").map(String::as_str).unwrap_or("?")
                );
            }
            let start = if start_differs { a.min(c) } else { a };
            let end = if end_differs { b.max(d) } else { b };
            let splice_point = if start_differs { a.max(c) } else { b.min(d) };
            (start.min(end), start.max(end), Some(splice_point))
        }
    })
}

fn retains_intron(site: &RmatsSite, a: &Isoform, b: &Isoform) -> bool {
    a.introns()
        .iter()
        .any(|intron| site.contains(intron) && b.exons().iter().any(|exon| exon.contains(intron)))
}

fn skips_exon(site: &RmatsSite, a: &Isoform, b: &Isoform) -> bool {
    a.exons()
        .iter()
        .any(|exon| site.contains(exon) && b.introns().iter().any(|intron| intron.contains(exon)))
}

fn switching_pairs<'g>(
    candidates: Vec<IsoformGroup<'g>>,
    project: &dyn ExpressionProject,
) -> Vec<IsoformGroup<'g>> {
    let control = project.control();
    let treatment = project.treatment();
    candidates
        .into_iter()
        .filter(|group| {
            let [a, b] = group.as_slice() else {
                warn!(
                    "Expression switch needs two isoforms, got [{}]",
                    group.iter().map(|i| i.id()).collect::<Vec<_>>().join(", ")
                );
                return false;
            };
            let a_c = control.tpm(a.mrna()).value;
            let a_t = treatment.tpm(a.mrna()).value;
            let b_c = control.tpm(b.mrna()).value;
            let b_t = treatment.tpm(b.mrna()).value;
            let expressed = a_c > 0.0 && a_t > 0.0 && b_c > 0.0 && b_t > 0.0;
            expressed && ((a_c < b_c && a_t > b_t) || (a_c > b_c && a_t < b_t))
        })
        .collect()
}

fn column<'a>(row: &'a RawRow, name: &str) -> Result<&'a str> {
    row.get(name)
        .map(|v| v.trim())
        .ok_or_else(|| SpliceError::MissingColumn(name.to_string()))
}

fn parse_error(column: &str, value: &str) -> SpliceError {
    SpliceError::Parse {
        column: column.to_string(),
        value: value.to_string(),
    }
}

fn int_column(row: &RawRow, name: &str) -> Result<i64> {
    let value = column(row, name)?;
    value.parse::<i64>().map_err(|_| parse_error(name, value))
}

fn optional_int(row: &RawRow, name: &str) -> Result<Option<i64>> {
    match row.get(name).map(|v| v.trim()) {
        None | Some("") | Some("NA") => Ok(None),
        Some(value) => value.parse::<i64>().map(Some).map_err(|_| parse_error(name, value)),
    }
}

fn optional_text(row: &RawRow, name: &str) -> Option<String> {
    row.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Missing statistics (`NA`, `nan`, empty) become NaN.
pub(crate) fn float_column(row: &RawRow, name: &str) -> Result<f64> {
    let value = column(row, name)?;
    if value.is_empty() || value.eq_ignore_ascii_case("na") || value.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    value.parse::<f64>().map_err(|_| parse_error(name, value))
}

fn share_f64(share: &[Value], idx: usize) -> Result<f64> {
    match share.get(idx) {
        Some(Value::Null) => Ok(f64::NAN),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| SpliceError::InvalidShare(format!("field {idx} is not a float"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| SpliceError::InvalidShare(format!("field {idx} '{s}' is not a float"))),
        _ => Err(SpliceError::InvalidShare(format!("field {idx} missing"))),
    }
}

fn share_i64(share: &[Value], idx: usize) -> Result<Option<i64>> {
    match share.get(idx) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| SpliceError::InvalidShare(format!("field {idx} is not an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| SpliceError::InvalidShare(format!("field {idx} '{s}' is not an integer"))),
        Some(other) => Err(SpliceError::InvalidShare(format!("field {idx} unexpected {other}"))),
    }
}

fn share_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
