//! Gene catalogs: JSON persistence, GTF import and event attachment.

use crate::error::{Result, SpliceError};
use crate::gene::Gene;
use crate::isoform::Isoform;
use crate::locus::{Locus, Strand};
use crate::rmats::{EventRecord, ExpressionRecord};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    io::BufRead,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneCatalog {
    pub genes: Vec<Gene>,
}

#[derive(Default)]
struct TranscriptBuilder {
    name: Option<String>,
    strand: Strand,
    exons: Vec<(i64, i64)>,
    cds: Vec<(i64, i64)>,
}

#[derive(Default)]
struct GeneBuilder {
    name: Option<String>,
    strand: Strand,
    transcripts: Vec<String>,
}

impl GeneCatalog {
    pub fn load_from_path(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save_to_path(&self, path: &str) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn gene(&self, id: &str) -> Option<&Gene> {
        self.genes.iter().find(|g| g.id() == id || g.name() == id)
    }

    /// Registers events with their genes; returns how many were attached.
    /// Events for genes missing from the catalog are skipped.
    pub fn attach_events(&mut self, records: Vec<EventRecord>) -> usize {
        let index: HashMap<String, usize> = self
            .genes
            .iter()
            .enumerate()
            .map(|(idx, g)| (g.id().to_string(), idx))
            .collect();
        let mut attached = 0;
        for record in records {
            match index.get(&record.gene_id) {
                Some(idx) => {
                    self.genes[*idx].add_event(record.event);
                    attached += 1;
                }
                None => warn!("No gene '{}' for {} event", record.gene_id, record.event.kind()),
            }
        }
        attached
    }

    /// Sets differential expression on the listed genes; returns how many
    /// genes were found.
    pub fn attach_differential_expression(&mut self, records: Vec<ExpressionRecord>) -> usize {
        let mut attached = 0;
        for record in records {
            match self.genes.iter_mut().find(|g| g.id() == record.gene_id) {
                Some(gene) => {
                    gene.set_differential_expression(record.de);
                    attached += 1;
                }
                None => warn!("No gene '{}' for differential expression", record.gene_id),
            }
        }
        attached
    }

    /// Builds genes and isoforms from a GTF file. `exon` and `CDS` lines
    /// carry the structure; names may also come from `gene` and
    /// `transcript` lines. Coordinates are kept 1-based inclusive, as in the file.
    pub fn from_gtf<R: BufRead>(reader: R) -> Result<Self> {
        let mut transcripts: BTreeMap<String, TranscriptBuilder> = BTreeMap::new();
        let mut genes: BTreeMap<String, GeneBuilder> = BTreeMap::new();
        let mut gene_order: Vec<String> = vec![];

        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 9 {
                return Err(SpliceError::MalformedLine(line.to_string()));
            }
            let feature = fields[2];
            if !matches!(feature, "gene" | "transcript" | "exon" | "CDS") {
                continue;
            }
            let strand: Strand = fields[6].parse()?;
            let attrs = parse_attributes(fields[8]);
            let Some(gene_id) = attrs.get("gene_id") else {
                return Err(SpliceError::MalformedLine(line.to_string()));
            };

            let gene = genes.entry(gene_id.clone()).or_insert_with(|| {
                gene_order.push(gene_id.clone());
                GeneBuilder {
                    strand,
                    ..Default::default()
                }
            });
            if gene.name.is_none() {
                gene.name = attrs.get("gene_name").cloned();
            }
            if feature == "gene" {
                continue;
            }

            let Some(tx_id) = attrs.get("transcript_id") else {
                return Err(SpliceError::MalformedLine(line.to_string()));
            };
            let tx = transcripts.entry(tx_id.clone()).or_insert_with(|| {
                gene.transcripts.push(tx_id.clone());
                TranscriptBuilder {
                    strand,
                    ..Default::default()
                }
            });
            if tx.name.is_none() {
                tx.name = attrs.get("transcript_name").cloned();
            }
            if feature == "transcript" {
                continue;
            }

            let start = parse_coordinate(fields[3], line)?;
            let end = parse_coordinate(fields[4], line)?;
            let range = (start.min(end), start.max(end));
            match feature {
                "exon" => tx.exons.push(range),
                _ => tx.cds.push(range),
            }
        }

        let mut ret = Self::default();
        for gene_id in gene_order {
            let Some(builder) = genes.remove(&gene_id) else {
                continue;
            };
            let mut isoforms = vec![];
            for tx_id in &builder.transcripts {
                let Some(tx) = transcripts.remove(tx_id) else {
                    continue;
                };
                if tx.exons.is_empty() {
                    warn!("Transcript '{tx_id}' has no exons, skipped");
                    continue;
                }
                let mut iso = Isoform::from_exons(tx_id.clone(), tx.strand, &tx.exons)?;
                if let Some(name) = tx.name {
                    iso.set_name(name);
                }
                iso.set_mrna(tx_id.clone());
                iso.set_cds(&tx.cds)?;
                isoforms.push(iso);
            }
            let Some(start) = isoforms.iter().map(Isoform::start).min() else {
                continue;
            };
            let end = isoforms.iter().map(Isoform::end).max().unwrap_or(start);
            let name = builder.name.unwrap_or_else(|| gene_id.clone());
            let mut gene = Gene::new(gene_id, Locus::new(name, start, end, builder.strand)?);
            for iso in isoforms {
                gene.add_isoform(iso);
            }
            ret.genes.push(gene);
        }
        debug!("Imported {} genes from GTF", ret.genes.len());
        Ok(ret)
    }
}

fn parse_coordinate(value: &str, line: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| SpliceError::MalformedLine(line.to_string()))
}

/// Parses `key "value"; key2 "value2";` GTF attributes.
fn parse_attributes(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            let (key, value) = part.split_once(char::is_whitespace)?;
            Some((key.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rmats::{EventRecord, ExpressionRecord};
    use crate::splicing::{EventKind, SplicingEvent};

    const GTF: &str = "\
#!genome-build test
chr1\tsrc\tgene\t100\t900\t.\t+\t.\tgene_id \"G1\"; gene_name \"ABC\";
chr1\tsrc\texon\t100\t200\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\"; transcript_name \"ABC-201\";
chr1\tsrc\texon\t400\t900\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tsrc\tCDS\t150\t200\t.\t+\t0\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tsrc\tCDS\t400\t450\t.\t+\t1\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tsrc\texon\t100\t900\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T2\";
chr2\tsrc\texon\t50\t80\t.\t-\t.\tgene_id \"G2\"; transcript_id \"T3\";
";

    #[test]
    fn imports_genes_from_gtf() {
        let catalog = GeneCatalog::from_gtf(GTF.as_bytes()).unwrap();
        assert_eq!(catalog.genes.len(), 2);
        let g1 = catalog.gene("G1").unwrap();
        assert_eq!(g1.name(), "ABC");
        assert_eq!(g1.isoforms().len(), 2);
        let t1 = g1.isoform_by_id("T1").unwrap();
        assert_eq!(t1.name(), "ABC-201");
        assert_eq!(t1.introns().len(), 1);
        assert_eq!(t1.cds().unwrap().len(), 2);
        assert!(!g1.isoform_by_id("T2").unwrap().has_cds());
        assert_eq!(catalog.gene("G2").unwrap().strand(), Strand::Reverse);
    }

    #[test]
    fn names_come_from_gene_and_transcript_lines() {
        let gtf = "\
chr5\tsrc\tgene\t10\t90\t.\t-\t.\tgene_id \"G7\"; gene_name \"XYZ\";
chr5\tsrc\ttranscript\t10\t90\t.\t-\t.\tgene_id \"G7\"; transcript_id \"T7\"; transcript_name \"XYZ-201\";
chr5\tsrc\texon\t10\t30\t.\t-\t.\tgene_id \"G7\"; transcript_id \"T7\";
chr5\tsrc\texon\t60\t90\t.\t-\t.\tgene_id \"G7\"; transcript_id \"T7\";
chr5\tsrc\tgene\t200\t300\t.\t+\t.\tgene_id \"G8\"; gene_name \"UVW\";
chr5\tsrc\texon\t200\t300\t.\t+\t.\tgene_id \"G8\"; transcript_id \"T8\";
";
        let catalog = GeneCatalog::from_gtf(gtf.as_bytes()).unwrap();
        let ids: Vec<&str> = catalog.genes.iter().map(|g| g.id()).collect();
        assert_eq!(ids, vec!["G7", "G8"]);
        let g7 = catalog.gene("XYZ").unwrap();
        assert_eq!(g7.id(), "G7");
        assert_eq!((g7.start(), g7.end()), (10, 90));
        assert_eq!(g7.isoforms().len(), 1);
        assert_eq!(g7.isoforms()[0].name(), "XYZ-201");
        assert_eq!(catalog.gene("UVW").unwrap().id(), "G8");
    }

    #[test]
    fn gene_without_exons_is_dropped() {
        let gtf = "chr1\tsrc\tgene\t1\t10\t.\t+\t.\tgene_id \"G1\"; gene_name \"ABC\";\n";
        let catalog = GeneCatalog::from_gtf(gtf.as_bytes()).unwrap();
        assert!(catalog.genes.is_empty());
    }

    #[test]
    fn differential_expression_is_attached_by_gene_id() {
        let mut catalog = GeneCatalog::from_gtf(GTF.as_bytes()).unwrap();
        let de = crate::gene::DifferentialExpression {
            log2_fold_change: 1.0,
            pvalue: 0.01,
            qvalue: 0.05,
        };
        let attached = catalog.attach_differential_expression(vec![
            ExpressionRecord {
                gene_id: "G2".to_string(),
                de: de.clone(),
            },
            ExpressionRecord {
                gene_id: "ABC".to_string(),
                de: de.clone(),
            },
        ]);
        assert_eq!(attached, 1);
        assert_eq!(catalog.gene("G2").unwrap().differential_expression(), Some(&de));
        assert!(catalog.gene("G1").unwrap().differential_expression().is_none());
    }

    #[test]
    fn malformed_gtf_line_is_an_error() {
        let gtf = "chr1\tsrc\texon\t100\n";
        assert!(GeneCatalog::from_gtf(gtf.as_bytes()).is_err());
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let mut catalog = GeneCatalog::from_gtf(GTF.as_bytes()).unwrap();
        let ev = SplicingEvent::from_3drnaseq(
            &[("maxdeltaPS", "0.3"), ("adj.pval", "0.01")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
        .unwrap();
        let attached = catalog.attach_events(vec![
            EventRecord {
                gene_id: "G1".to_string(),
                event: ev.clone(),
            },
            EventRecord {
                gene_id: "missing".to_string(),
                event: ev,
            },
        ]);
        assert_eq!(attached, 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.json");
        let path = path.to_string_lossy();
        catalog.save_to_path(&path).unwrap();
        let back = GeneCatalog::load_from_path(&path).unwrap();
        assert_eq!(back, catalog);
        assert_eq!(back.gene("G1").unwrap().events()[0].kind(), EventKind::ThreeDRnaSeq);
    }
}
