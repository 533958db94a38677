//! Per-gene classification summaries, as printed by `spliceview classify`.

use crate::{
    expression::{ExpressionProject, Project},
    gene::{DifferentialExpression, Gene},
    gene_models::GeneCatalog,
    splicing::SplicingEvent,
};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventReport {
    pub kind: String,
    pub share: Vec<Value>,
    pub impact: Option<i64>,
    pub site_relative: Option<(i64, i64)>,
    /// Isoform ids of each consistent pair.
    pub pairs: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub switches: Vec<(String, Vec<String>)>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeneReport {
    pub gene_id: String,
    pub name: String,
    pub isoforms: usize,
    pub accessions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub differential_expression: Option<DifferentialExpression>,
    pub events: Vec<EventReport>,
}

fn event_report(
    event: &SplicingEvent,
    gene: &Gene,
    project: Option<&dyn ExpressionProject>,
) -> EventReport {
    let pairs = event
        .isoform_pairs(gene, project)
        .into_iter()
        .map(|group| group.iter().map(|i| i.id().to_string()).collect())
        .collect();
    let switches = match project {
        Some(project) if event.site().is_none() => event.switch_candidates(gene, project),
        _ => vec![],
    };
    EventReport {
        kind: event.kind().to_string(),
        share: event.share(),
        impact: event.impact(),
        site_relative: event.site_relative(gene),
        pairs,
        switches,
    }
}

pub fn gene_report(gene: &Gene, project: Option<&dyn ExpressionProject>) -> GeneReport {
    GeneReport {
        gene_id: gene.id().to_string(),
        name: gene.name().to_string(),
        isoforms: gene.isoforms().len(),
        accessions: gene.annotation_accessions(None),
        differential_expression: gene.differential_expression().cloned(),
        events: gene.events().iter().map(|e| event_report(e, gene, project)).collect(),
    }
}

/// Classifies every gene with events, in parallel; output keeps catalog order.
pub fn classify_catalog(catalog: &GeneCatalog, project: Option<&Project>) -> Vec<GeneReport> {
    catalog
        .genes
        .par_iter()
        .filter(|gene| gene.is_spliced())
        .map(|gene| gene_report(gene, project.map(|p| p as &dyn ExpressionProject)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Condition;
    use crate::isoform::Isoform;
    use crate::locus::{Locus, Strand};
    use crate::splicing::{EventKind, RawRow};

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn catalog() -> GeneCatalog {
        let mut spliced = Gene::new("G1", Locus::new("ABC", 1, 1000, Strand::Forward).unwrap());
        let t1 = Isoform::from_exons("T1", Strand::Forward, &[(1, 100), (400, 1000)]).unwrap();
        let t2_exons = [(1, 100), (200, 300), (400, 1000)];
        let t2 = Isoform::from_exons("T2", Strand::Forward, &t2_exons).unwrap();
        spliced.add_isoform(t1);
        spliced.add_isoform(t2);
        let se = SplicingEvent::from_rmats(
            &row(&[
                ("exonStart_0base", "200"),
                ("exonEnd", "300"),
                ("IncLevelDifference", "0.2"),
                ("FDR", "0.05"),
            ]),
            EventKind::SkippedExon,
        )
        .unwrap();
        spliced.add_event(se);
        let das = row(&[("maxdeltaPS", "0.3"), ("adj.pval", "0.01")]);
        spliced.add_event(SplicingEvent::from_3drnaseq(&das).unwrap());
        let quiet = Gene::new("G2", Locus::new("DEF", 1, 10, Strand::Reverse).unwrap());
        GeneCatalog {
            genes: vec![spliced, quiet],
        }
    }

    #[test]
    fn only_spliced_genes_are_reported() {
        let reports = classify_catalog(&catalog(), None);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.gene_id, "G1");
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.events[0].pairs, vec![vec!["T1".to_string(), "T2".to_string()]]);
        assert_eq!(report.events[0].impact, Some(101));
        assert_eq!(report.events[0].site_relative, Some((199, 299)));
        assert!(report.events[1].pairs.is_empty());
        assert!(report.differential_expression.is_none());
        let json = serde_json::to_value(report).unwrap();
        assert!(json.get("differential_expression").is_none());
    }

    #[test]
    fn differential_expression_is_reported() {
        let mut catalog = catalog();
        catalog.genes[0].set_differential_expression(DifferentialExpression {
            log2_fold_change: -2.0,
            pvalue: f64::NAN,
            qvalue: 0.01,
        });
        let reports = classify_catalog(&catalog, None);
        let de = reports[0].differential_expression.as_ref().unwrap();
        assert_eq!(de.log2_fold_change, -2.0);
        let json = serde_json::to_value(&reports[0]).unwrap();
        assert_eq!(json["differential_expression"]["qvalue"], 0.01);
        assert!(json["differential_expression"]["pvalue"].is_null());
    }

    #[test]
    fn expression_drives_3drnaseq_pairs() {
        let mut control = Condition::new("control", "#4e79a7");
        control.set_tpm("T1", 10.0, 3.0);
        control.set_tpm("T2", 2.0, 3.0);
        let mut treatment = Condition::new("treatment", "#f28e2c");
        treatment.set_tpm("T1", 1.0, 3.0);
        treatment.set_tpm("T2", 8.0, 3.0);
        let project = Project::new(control, treatment);
        let reports = classify_catalog(&catalog(), Some(&project));
        let three_d = &reports[0].events[1];
        assert_eq!(three_d.kind, "3DRNASeq");
        assert_eq!(three_d.pairs, vec![vec!["T1".to_string(), "T2".to_string()]]);
        assert_eq!(three_d.switches.len(), 2);
        let json = serde_json::to_value(&reports[0]).unwrap();
        assert!(json["events"][0].get("switches").is_none());
    }
}
