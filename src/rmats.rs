//! Readers for splicing-tool output tables (rMATS and 3D RNA-seq).

use crate::error::{Result, SpliceError};
use crate::gene::DifferentialExpression;
use crate::splicing::{EventKind, RawRow, SplicingEvent};
use csv::{ReaderBuilder, StringRecord};
use log::debug;
use std::{io::Read, path::Path};

/// An event together with the id of the gene it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub gene_id: String,
    pub event: SplicingEvent,
}

/// Differential expression statistics for one gene.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionRecord {
    pub gene_id: String,
    pub de: DifferentialExpression,
}

/// Guesses the event type from an rMATS file name such as `SE.MATS.JC.txt`
/// or `fromGTF.A3SS.txt`.
pub fn kind_from_path(path: &Path) -> Option<EventKind> {
    let name = path.file_name()?.to_str()?;
    name.split(['.', '_'])
        .find_map(|part| match part.parse::<EventKind>() {
            Ok(EventKind::ThreeDRnaSeq) | Err(_) => None,
            Ok(kind) => Some(kind),
        })
}

fn rows<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rdr = ReaderBuilder::new().delimiter(b'\t').from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut ret = vec![];
    let mut record = StringRecord::new();
    while rdr.read_record(&mut record)? {
        let mut row = RawRow::new();
        for (key, value) in headers.iter().zip(record.iter()) {
            // rMATS repeats `ID` in its count columns; the first one is the event id
            row.entry(key.trim().to_string())
                .or_insert_with(|| value.trim().to_string());
        }
        ret.push(row);
    }
    Ok(ret)
}

fn gene_id(row: &RawRow, column: &str) -> Result<String> {
    row.get(column)
        .map(|v| v.trim_matches('"').to_string())
        .ok_or_else(|| SpliceError::MissingColumn(column.to_string()))
}

/// Reads a tab separated rMATS table; every row becomes one event of `kind`.
pub fn read_rmats_table<R: Read>(reader: R, kind: EventKind) -> Result<Vec<EventRecord>> {
    let ret = rows(reader)?
        .iter()
        .map(|row| {
            Ok(EventRecord {
                gene_id: gene_id(row, "GeneID")?,
                event: SplicingEvent::from_rmats(row, kind)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("Read {} {} events", ret.len(), kind);
    Ok(ret)
}

/// Reads a tab separated 3D RNA-seq DAS gene table keyed on `target`.
pub fn read_3drnaseq_table<R: Read>(reader: R) -> Result<Vec<EventRecord>> {
    let ret = rows(reader)?
        .iter()
        .map(|row| {
            Ok(EventRecord {
                gene_id: gene_id(row, "target")?,
                event: SplicingEvent::from_3drnaseq(row)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("Read {} 3D RNA-seq events", ret.len());
    Ok(ret)
}

/// Reads a tab separated 3D RNA-seq DE gene table keyed on `target`.
pub fn read_3drnaseq_de_table<R: Read>(reader: R) -> Result<Vec<ExpressionRecord>> {
    let ret = rows(reader)?
        .iter()
        .map(|row| {
            Ok(ExpressionRecord {
                gene_id: gene_id(row, "target")?,
                de: DifferentialExpression::from_3drnaseq(row)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("Read differential expression of {} genes", ret.len());
    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SE_TABLE: &str = "ID\tGeneID\tgeneSymbol\tchr\tstrand\texonStart_0base\texonEnd\tupstreamES\tupstreamEE\tdownstreamES\tdownstreamEE\tID\tPValue\tFDR\tIncLevelDifference\n\
1\t\"G1\"\t\"ABC\"\tchr1\t+\t119\t180\t10\t50\t300\t400\t1\t0.001\t0.01\t0.35\n\
2\t\"G2\"\t\"DEF\"\tchr2\t-\t500\t560\t400\t420\t700\t800\t2\t0.2\t0.5\t-0.05\n";

    #[test]
    fn reads_rmats_rows() {
        let records = read_rmats_table(SE_TABLE.as_bytes(), EventKind::SkippedExon).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].gene_id, "G1");
        assert_eq!(records[0].event.site(), Some((119, 180)));
        assert_eq!(records[0].event.extra("geneSymbol"), Some("ABC"));
        assert_eq!(records[1].event.rmats_site().unwrap().id.as_deref(), Some("2"));
        assert_eq!(records[1].event.delta(), -0.05);
    }

    #[test]
    fn bad_coordinates_fail_the_table() {
        let table = "GeneID\tIncLevelDifference\tFDR\texonStart_0base\texonEnd\n\
                     G1\t0.1\t0.2\tabc\t10\n";
        assert!(read_rmats_table(table.as_bytes(), EventKind::SkippedExon).is_err());
    }

    #[test]
    fn reads_3drnaseq_rows() {
        let table = "target\tcontrast\tadj.pval\tmaxdeltaPS\nG7\tT-C\t0.001\t0.42\n";
        let records = read_3drnaseq_table(table.as_bytes()).unwrap();
        assert_eq!(records[0].gene_id, "G7");
        assert_eq!(records[0].event.kind(), EventKind::ThreeDRnaSeq);
        assert_eq!(records[0].event.extra("contrast"), Some("T-C"));
    }

    #[test]
    fn reads_3drnaseq_de_rows() {
        let table = "target\tcontrast\tlog2FC\tpval\tadj.pval\tup.down\n\
                     G7\tT-C\t2.25\t0.0001\t0.002\tup-regulated\n";
        let records = read_3drnaseq_de_table(table.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gene_id, "G7");
        assert_eq!(records[0].de.log2_fold_change, 2.25);
        assert_eq!(records[0].de.pvalue, 0.0001);
        assert_eq!(records[0].de.qvalue, 0.002);

        let missing = "target\tadj.pval\nG7\t0.002\n";
        assert!(matches!(
            read_3drnaseq_de_table(missing.as_bytes()),
            Err(SpliceError::MissingColumn(c)) if c == "log2FC"
        ));
    }

    #[test]
    fn kind_from_file_names() {
        let kind = |name: &str| kind_from_path(&PathBuf::from(name));
        assert_eq!(kind("out/SE.MATS.JC.txt"), Some(EventKind::SkippedExon));
        assert_eq!(kind("fromGTF.A3SS.txt"), Some(EventKind::Alternative3ss));
        assert_eq!(kind("RI.MATS.JCEC.txt"), Some(EventKind::RetainedIntron));
        assert_eq!(kind("summary.txt"), None);
    }
}
