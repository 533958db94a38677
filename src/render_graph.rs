use crate::{
    canvas::{Canvas, SvgCanvas},
    error::Result,
    force_graph::{ForceSimulation, GraphData, Invalidation},
    settings::GraphSettings,
};
use log::debug;
use std::collections::HashMap;
use svg::Node;
use svg::node::element::{Circle, Element, Group, Line};

fn node_title(id: &str, group: &str) -> Element {
    let mut title = Element::new("title");
    title.append(svg::node::Text::new(format!("{id} ({group})")));
    title
}

/// Lays out `data` with a force simulation and draws it centered on the
/// canvas. The layout runs until it settles, `settings.max_ticks` is hit or
/// `invalidation` fires; whatever positions were reached are drawn.
pub fn export_graph_svg(
    data: &GraphData,
    settings: &GraphSettings,
    invalidation: &Invalidation,
) -> Result<String> {
    let mut simulation = ForceSimulation::new(data)?;
    let ticks = simulation.run(invalidation, settings.max_ticks, |_| {});
    debug!(
        "Graph layout of {} nodes stopped after {ticks} ticks (alpha {:.4})",
        data.nodes.len(),
        simulation.alpha()
    );
    let positions = simulation.nodes();

    let palette: HashMap<&str, &str> = data
        .groups()
        .into_iter()
        .enumerate()
        .map(|(i, group)| {
            let color = settings
                .colors
                .get(i % settings.colors.len().max(1))
                .map(String::as_str)
                .unwrap_or("currentColor");
            (group, color)
        })
        .collect();
    let index: HashMap<&str, usize> = data
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut links = Group::new()
        .set("stroke", settings.link_stroke.clone())
        .set("stroke-opacity", settings.link_stroke_opacity)
        .set("stroke-width", settings.link_stroke_width)
        .set("stroke-linecap", settings.link_stroke_linecap.clone());
    for link in &data.links {
        let (Some(s), Some(t)) = (
            index.get(link.source.as_str()),
            index.get(link.target.as_str()),
        ) else {
            continue;
        };
        let (s, t) = (positions[*s], positions[*t]);
        links = links.add(
            Line::new()
                .set("x1", s.x as f32)
                .set("y1", s.y as f32)
                .set("x2", t.x as f32)
                .set("y2", t.y as f32),
        );
    }

    let mut nodes = Group::new()
        .set("fill", "currentColor")
        .set("stroke", settings.node_stroke.clone())
        .set("stroke-opacity", settings.node_stroke_opacity)
        .set("stroke-width", settings.node_stroke_width);
    for (node, pos) in data.nodes.iter().zip(positions) {
        let fill = palette.get(node.group.as_str()).copied().unwrap_or("currentColor");
        nodes = nodes.add(
            Circle::new()
                .set("cx", pos.x as f32)
                .set("cy", pos.y as f32)
                .set("r", settings.node_radius)
                .set("fill", fill)
                .add(node_title(&node.id, &node.group)),
        );
    }

    let mut canvas = SvgCanvas::new(settings.width, settings.height);
    canvas.set_transform(format!("translate({},{})", settings.width / 2.0, settings.height / 2.0));
    canvas.push(links);
    canvas.push(nodes);
    Ok(canvas.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::force_graph::{GraphLink, GraphNode};

    #[test]
    fn demo_graph_renders_nodes_and_links() {
        let svg = export_graph_svg(
            &GraphData::default(),
            &GraphSettings::default(),
            &Invalidation::new(),
        )
        .unwrap();
        assert_eq!(svg.matches("<circle").count(), 3);
        assert_eq!(svg.matches("<line").count(), 3);
        assert!(svg.contains("a (x)"));
        assert!(svg.contains("b (y)"));
        assert!(svg.contains("#4e79a7"));
        assert!(svg.contains("#f28e2c"));
        assert!(svg.contains("translate(300,200)"));
        assert!(svg.contains("stroke=\"#999\""));
    }

    #[test]
    fn invalidated_layout_still_draws_initial_positions() {
        let invalidation = Invalidation::new();
        invalidation.cancel();
        let data = GraphData {
            nodes: vec![GraphNode {
                id: "solo".to_string(),
                group: "g".to_string(),
            }],
            links: vec![],
        };
        let svg = export_graph_svg(&data, &GraphSettings::default(), &invalidation).unwrap();
        assert!(svg.contains("solo (g)"));
    }

    #[test]
    fn bad_link_fails_export() {
        let mut data = GraphData::default();
        data.links.push(GraphLink {
            source: "nope".to_string(),
            target: "a".to_string(),
        });
        assert!(export_graph_svg(&data, &GraphSettings::default(), &Invalidation::new()).is_err());
    }
}
