pub mod about;
pub mod canvas;
pub mod error;
pub mod expression;
pub mod force_graph;
pub mod gene;
pub mod gene_models;
pub mod isoform;
pub mod locus;
pub mod render_gene;
pub mod render_graph;
pub mod report;
pub mod rmats;
pub mod scale;
pub mod settings;
pub mod splicing;

pub use error::{Result, SpliceError};
