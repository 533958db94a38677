pub const SPLICEVIEW_DISPLAY_VERSION: &str = env!("SPLICEVIEW_DISPLAY_VERSION");
pub const SPLICEVIEW_BUILD_N: &str = env!("SPLICEVIEW_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "spliceview {}\nBuild {}\nGene-structure and alternative-splicing diagrams",
        SPLICEVIEW_DISPLAY_VERSION, SPLICEVIEW_BUILD_N
    )
}
