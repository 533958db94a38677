use crate::{
    canvas::{Canvas, Style, SvgCanvas, TextStyle, ViewBox},
    expression::{ExpressionProject, Tpm},
    gene::Gene,
    isoform::Isoform,
    locus::Locus,
    scale::{FeatureBox, LinearScale, Ruler},
    settings::PlotSettings,
};
use std::collections::BTreeSet;

const TPM_DIAMETER: f32 = 16.0;
const ISOFORM_ROW_MIN_HEIGHT: f32 = 40.0;
const FEATURE_OFFSET_Y: f32 = 20.0;
const RULER_HIT_HEIGHT: f32 = 8.0;

fn tpm_tooltip(tpm: Tpm, gene: &Gene) -> String {
    if tpm.count > 0.0 {
        format!("({}) TPM μ {}", tpm.count, tpm.value)
    } else {
        format!(" {} ?", gene.id())
    }
}

fn plot_tpm<C: Canvas>(
    canvas: &mut C,
    gene: &Gene,
    project: &dyn ExpressionProject,
    box_gene: &ViewBox,
    y: f32,
) {
    let r = TPM_DIAMETER / 2.0;
    let sources = [
        (5.0 + box_gene.x0(), project.control()),
        (8.0 + box_gene.x0() + TPM_DIAMETER, project.treatment()),
    ];
    for (cx, source) in sources {
        let tpm = source.gene_tpm(gene.id());
        canvas.circle(cx, y, r, &Style::default().fill("white").stroke("black", 1.0));
        canvas.circle(
            cx,
            y,
            r,
            &Style::default()
                .fill(source.color())
                .opacity(0.5)
                .class(format!("tpm {}", source.name()))
                .title(tpm_tooltip(tpm, gene)),
        );
    }
}

/// Unique event spans in registration order.
fn event_sites(gene: &Gene) -> Vec<Locus> {
    let mut seen = BTreeSet::new();
    gene.events()
        .iter()
        .filter_map(|event| {
            let (start, end) = event.site()?;
            let name = format!("{} {start}-{end}", event.kind());
            seen.insert((start, end))
                .then(|| Locus::spanning(name, start, end, gene.strand()))
        })
        .collect()
}

fn plot_ruler<C: Canvas>(
    canvas: &mut C,
    gene: &Gene,
    view: &ViewBox,
    box_gene: &ViewBox,
    settings: &PlotSettings,
) {
    let ruler = Ruler::new(gene.locus(), box_gene.width());
    let hit = ViewBox::new(
        box_gene.x0() - ruler.margin,
        box_gene.y0() + settings.gene_header_height * 0.3,
        ruler.width(),
        RULER_HIT_HEIGHT,
    );
    canvas.ruler(
        &ruler,
        &hit,
        (box_gene.y0() + 10.0, view.y1() + 5.0),
        box_gene.y1() + 5.0,
        &Style::default().stroke(settings.ruler_color.clone(), 1.0),
        &TextStyle {
            font_size: settings.axis_font_size,
            ..Default::default()
        },
    );
}

fn plot_isoform<C: Canvas>(
    canvas: &mut C,
    isoform: &Isoform,
    row: &ViewBox,
    scale: &LinearScale,
    settings: &PlotSettings,
) {
    let label = FeatureBox::map(isoform.locus(), scale, row);
    canvas.text(
        label.x,
        label.y + 5.0,
        isoform.name(),
        &TextStyle {
            font_size: settings.isoform_font_size,
            bold: true,
            vertical_center: true,
            ..Default::default()
        },
    );

    let features = row.add_padding_y(FEATURE_OFFSET_Y);
    for intron in isoform.introns() {
        let b = FeatureBox::map(intron, scale, &features);
        canvas.wave(
            b.x,
            b.y + 3.0,
            b.width,
            settings.intron_amplitude,
            &Style::default()
                .stroke(settings.intron_color.clone(), 1.0)
                .title(intron.name()),
        );
    }

    let exon_fill = canvas.define_gradient(&settings.exon_color);
    for exon in isoform.exons() {
        let b = FeatureBox::map(exon, scale, &features);
        canvas.rect(
            b.x,
            b.y,
            b.width,
            settings.exon_height,
            &Style::default()
                .fill(exon_fill.clone())
                .stroke("black", 2.0)
                .rounded(8.0)
                .title(exon.name()),
        );
    }

    if let Some(cds) = isoform.cds() {
        let cds_fill = canvas.define_gradient(&settings.cds_color);
        for segment in cds {
            let b = FeatureBox::map(segment, scale, &features);
            canvas.rect(
                b.x,
                b.y + 1.0,
                b.width,
                settings.cds_height + 2.0,
                &Style::default()
                    .fill(cds_fill.clone())
                    .stroke("black", 2.0)
                    .rounded(5.0)
                    .title(segment.name()),
            );
        }
    }

    if !settings.show_domains || isoform.domains().is_empty() {
        return;
    }
    let hatch = canvas.define_pattern(&settings.domain_color, 2.0);
    for domain in isoform.domains() {
        let title = if domain.description.is_empty() {
            domain.accession.clone()
        } else {
            format!("{} {}", domain.accession, domain.description)
        };
        for locus in domain.to_loci(isoform) {
            let b = FeatureBox::map(&locus, scale, &features);
            canvas.rect(
                b.x,
                b.y + 1.0,
                b.width,
                settings.cds_height + 2.0,
                &Style::default()
                    .fill(hatch.clone())
                    .rounded(5.0)
                    .class("domain")
                    .title(title.clone()),
            );
        }
    }
}

/// Total height needed so every isoform row keeps a readable size.
pub fn gene_plot_height(gene: &Gene, settings: &PlotSettings) -> f32 {
    let header = 2.0 * (settings.gene_header_height + 10.0) + 2.0 * settings.padding;
    settings
        .height
        .max(header + gene.isoforms().len() as f32 * ISOFORM_ROW_MIN_HEIGHT)
}

/// Draws `gene` onto `canvas`, which must be `settings.width` wide and
/// `height` tall.
pub fn plot_gene<C: Canvas>(
    canvas: &mut C,
    gene: &Gene,
    project: Option<&dyn ExpressionProject>,
    settings: &PlotSettings,
    height: f32,
) {
    let view = ViewBox::new(0.0, 0.0, settings.width, height)
        .add_padding(settings.padding, settings.padding);
    let gh = settings.gene_header_height;
    let box_gene = view.with_height(gh);
    let scale = LinearScale::for_locus(gene.locus(), box_gene.x0(), box_gene.x1());

    if settings.show_axis {
        canvas.axis_top(&scale, box_gene.y0() + gh * 0.4, settings.axis_font_size);
    }

    if settings.show_event_sites {
        let shade = canvas.define_pattern(&settings.site_color, 1.0);
        let band = ViewBox::new(view.x0(), box_gene.y1(), view.width(), view.height() - gh);
        for site in event_sites(gene) {
            let b = FeatureBox::map(&site, &scale, &band);
            canvas.rect(
                b.x,
                b.y,
                b.width,
                b.height,
                &Style::default().fill(shade.clone()).class("as-site").title(site.name()),
            );
        }
    }

    let name_y = box_gene.y0() + gh * 0.7 + TPM_DIAMETER / 4.0;
    if let Some(project) = project {
        plot_tpm(canvas, gene, project, &box_gene, name_y);
    }
    canvas.text(
        box_gene.x0() + TPM_DIAMETER * 2.0 + 4.0,
        name_y,
        gene.name(),
        &TextStyle {
            font_size: settings.gene_font_size,
            bold: true,
            vertical_center: true,
            ..Default::default()
        },
    );

    if settings.show_ruler {
        plot_ruler(canvas, gene, &view, &box_gene, settings);
    }

    let rows = view.add_padding_y(gh + 10.0).split_y(gene.isoforms().len());
    for (isoform, row) in gene.isoforms().iter().zip(rows.iter()) {
        plot_isoform(canvas, isoform, row, &scale, settings);
    }
}

pub fn export_gene_svg(
    gene: &Gene,
    project: Option<&dyn ExpressionProject>,
    settings: &PlotSettings,
) -> String {
    let height = gene_plot_height(gene, settings);
    let mut canvas = SvgCanvas::new(settings.width, height);
    plot_gene(&mut canvas, gene, project, settings, height);
    canvas.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Condition, Project};
    use crate::isoform::DomainAnnotation;
    use crate::locus::Strand;
    use crate::splicing::{EventKind, RawRow, SplicingEvent};

    fn gene(strand: Strand) -> Gene {
        let mut gene = Gene::new("G1", Locus::new("ABC", 100, 1000, strand).unwrap());
        let mut t1 = Isoform::from_exons("T1", strand, &[(100, 300), (600, 1000)]).unwrap();
        t1.set_cds(&[(200, 300), (600, 700)]).unwrap();
        t1.add_domain(DomainAnnotation {
            accession: "PF00069".to_string(),
            source: "Pfam".to_string(),
            description: "Pkinase".to_string(),
            protein_start: 5,
            protein_end: 40,
        });
        gene.add_isoform(t1);
        let t2 = Isoform::from_exons("T2", strand, &[(100, 300), (400, 500), (600, 1000)]).unwrap();
        gene.add_isoform(t2);
        let row: RawRow = [
            ("exonStart_0base", "400"),
            ("exonEnd", "500"),
            ("IncLevelDifference", "0.4"),
            ("FDR", "0.01"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let event = SplicingEvent::from_rmats(&row, EventKind::SkippedExon).unwrap();
        gene.add_event(event.clone());
        gene.add_event(event);
        gene
    }

    #[test]
    fn gene_plot_draws_all_layers() {
        let svg = export_gene_svg(&gene(Strand::Forward), None, &PlotSettings::default());
        assert!(svg.contains("ABC"));
        assert!(svg.contains("T1"));
        assert!(svg.contains("T2"));
        assert!(svg.contains("gradient-green"));
        assert!(svg.contains("gradient-blue"));
        assert!(svg.contains("hatch-cyan"));
        assert!(svg.contains("PF00069 Pkinase"));
        assert!(svg.contains("class=\"tick\""));
        assert!(svg.contains("data-bp-per-px"));
        assert!(svg.contains("onmousemove=\"spliceviewRuler(evt)\""));
        assert!(svg.contains("class=\"ruler-label\""));
        assert!(svg.contains("class=\"ruler-guide\""));
        assert_eq!(svg.matches("class=\"as-site\"").count(), 1);
        assert!(!svg.contains("TPM"));
    }

    #[test]
    fn reverse_strand_has_no_negative_widths() {
        let svg = export_gene_svg(&gene(Strand::Reverse), None, &PlotSettings::default());
        assert!(svg.contains("ABC"));
        assert!(!svg.contains("width=\"-"));
        assert!(svg.contains("data-direction=\"-1\""));
    }

    #[test]
    fn tpm_circles_use_condition_colors() {
        let mut control = Condition::new("control", "#1f77b4");
        control.genes.insert("G1".to_string(), Tpm { value: 12.5, count: 3.0 });
        let treatment = Condition::new("treatment", "#ff7f0e");
        let project = Project::new(control, treatment);
        let svg = export_gene_svg(&gene(Strand::Forward), Some(&project), &PlotSettings::default());
        assert!(svg.contains("#1f77b4"));
        assert!(svg.contains("#ff7f0e"));
        assert!(svg.contains("(3) TPM μ 12.5"));
        assert!(svg.contains(" G1 ?"));
    }

    #[test]
    fn toggles_remove_layers() {
        let settings = PlotSettings {
            show_axis: false,
            show_event_sites: false,
            show_domains: false,
            show_ruler: false,
            ..Default::default()
        };
        let svg = export_gene_svg(&gene(Strand::Forward), None, &settings);
        assert!(!svg.contains("class=\"tick\""));
        assert!(!svg.contains("as-site"));
        assert!(!svg.contains("hatch-cyan"));
        assert!(!svg.contains("ruler"));
    }

    #[test]
    fn height_grows_with_isoforms() {
        let settings = PlotSettings::default();
        let mut g = Gene::new("G", Locus::new("G", 1, 100, Strand::Forward).unwrap());
        assert_eq!(gene_plot_height(&g, &settings), settings.height);
        for i in 0..20 {
            let iso = Isoform::from_exons(format!("T{i}"), Strand::Forward, &[(1, 100)]).unwrap();
            g.add_isoform(iso);
        }
        assert!(gene_plot_height(&g, &settings) > settings.height);
        let svg = export_gene_svg(&g, None, &settings);
        assert!(svg.contains("T19"));
    }
}
