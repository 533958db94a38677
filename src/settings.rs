//! Rendering configuration for the gene and graph views.

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSettings {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    /// Height of the gene header band holding axis, name and ruler.
    pub gene_header_height: f32,
    pub exon_height: f32,
    pub cds_height: f32,
    pub exon_color: String,
    pub cds_color: String,
    pub domain_color: String,
    pub site_color: String,
    pub intron_color: String,
    pub intron_amplitude: f32,
    pub ruler_color: String,
    pub axis_font_size: f32,
    pub gene_font_size: f32,
    pub isoform_font_size: f32,
    pub show_axis: bool,
    pub show_event_sites: bool,
    pub show_domains: bool,
    pub show_ruler: bool,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            width: 900.0,
            height: 400.0,
            padding: 5.0,
            gene_header_height: 40.0,
            exon_height: 15.0,
            cds_height: 11.0,
            exon_color: "green".to_string(),
            cds_color: "blue".to_string(),
            domain_color: "cyan".to_string(),
            site_color: "gray".to_string(),
            intron_color: "black".to_string(),
            intron_amplitude: 4.0,
            ruler_color: "gray".to_string(),
            axis_font_size: 8.0,
            gene_font_size: 12.8,
            isoform_font_size: 9.6,
            show_axis: true,
            show_event_sites: true,
            show_domains: true,
            show_ruler: true,
        }
    }
}

impl PlotSettings {
    pub fn load_from_path(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub width: f32,
    pub height: f32,
    pub node_radius: f32,
    pub node_stroke: String,
    pub node_stroke_width: f32,
    pub node_stroke_opacity: f32,
    pub link_stroke: String,
    pub link_stroke_opacity: f32,
    pub link_stroke_width: f32,
    pub link_stroke_linecap: String,
    /// Palette cycled over node groups in first-seen order.
    pub colors: Vec<String>,
    /// Wall-clock budget for the layout; 0 disables the deadline.
    pub timeout_ms: u64,
    pub max_ticks: usize,
}

/// d3 `schemeTableau10`.
pub const TABLEAU10: [&str; 10] = [
    "#4e79a7", "#f28e2c", "#e15759", "#76b7b2", "#59a14f", "#edc949", "#af7aa1", "#ff9da7",
    "#9c755f", "#bab0ab",
];

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 400.0,
            node_radius: 5.0,
            node_stroke: "#fff".to_string(),
            node_stroke_width: 1.5,
            node_stroke_opacity: 1.0,
            link_stroke: "#999".to_string(),
            link_stroke_opacity: 0.6,
            link_stroke_width: 1.5,
            link_stroke_linecap: "round".to_string(),
            colors: TABLEAU10.iter().map(|c| c.to_string()).collect(),
            timeout_ms: 3000,
            max_ticks: 300,
        }
    }
}

impl GraphSettings {
    pub fn load_from_path(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.json");
        std::fs::write(&path, r#"{"width": 1200, "show_ruler": false}"#).unwrap();
        let settings = PlotSettings::load_from_path(&path.to_string_lossy()).unwrap();
        assert_eq!(settings.width, 1200.0);
        assert!(!settings.show_ruler);
        assert_eq!(settings.gene_header_height, 40.0);
        assert_eq!(settings.exon_color, "green");
    }

    #[test]
    fn graph_defaults() {
        let settings: GraphSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, GraphSettings::default());
        assert_eq!(settings.colors.len(), 10);
        assert_eq!(settings.timeout_ms, 3000);
    }
}
