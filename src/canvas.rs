//! Drawing surface abstraction and its SVG implementation.

use crate::scale::{LinearScale, Ruler, format_position};
use std::collections::HashSet;
use svg::Document;
use svg::Node;
use svg::node::element::{
    Circle, Definitions, Element, Group, Line, LinearGradient, Path, Pattern, Rectangle, Script,
    Stop, Text,
};

/// Axis-aligned layout box in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl ViewBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn x0(&self) -> f32 {
        self.x
    }

    pub fn x1(&self) -> f32 {
        self.x + self.width
    }

    pub fn y0(&self) -> f32 {
        self.y
    }

    pub fn y1(&self) -> f32 {
        self.y + self.height
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Shrinks the box by `px` on the left and right and `py` on top and bottom.
    pub fn add_padding(&self, px: f32, py: f32) -> Self {
        Self::new(self.x + px, self.y + py, self.width - 2.0 * px, self.height - 2.0 * py)
    }

    pub fn add_padding_y(&self, py: f32) -> Self {
        self.add_padding(0.0, py)
    }

    /// Same origin and width with a new height.
    pub fn with_height(&self, height: f32) -> Self {
        Self::new(self.x, self.y, self.width, height)
    }

    /// Splits the box into `n` stacked rows of equal height.
    pub fn split_y(&self, n: usize) -> Vec<Self> {
        if n == 0 {
            return vec![];
        }
        let h = self.height / n as f32;
        (0..n)
            .map(|i| Self::new(self.x, self.y + i as f32 * h, self.width, h))
            .collect()
    }
}

/// Presentation attributes of a shape. Unset fields are left to the
/// surface defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Style {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f32>,
    pub opacity: Option<f32>,
    pub corner_radius: Option<f32>,
    pub title: Option<String>,
    pub class: Option<String>,
}

impl Style {
    pub fn fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    pub fn stroke(mut self, stroke: impl Into<String>, width: f32) -> Self {
        self.stroke = Some(stroke.into());
        self.stroke_width = Some(width);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn rounded(mut self, radius: f32) -> Self {
        self.corner_radius = Some(radius);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub bold: bool,
    pub anchor: &'static str,
    /// Center the text vertically on `y` instead of sitting on it.
    pub vertical_center: bool,
    pub fill: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 10.0,
            bold: false,
            anchor: "start",
            vertical_center: false,
            fill: "black".to_string(),
        }
    }
}

pub trait Canvas {
    /// Registers a vertical gradient fading into `color` and returns the
    /// paint reference (`url(#...)`) to fill shapes with.
    fn define_gradient(&mut self, color: &str) -> String;
    /// Registers a diagonal hatch pattern and returns its paint reference.
    fn define_pattern(&mut self, color: &str, stroke_width: f32) -> String;
    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, style: &Style);
    /// A wavy horizontal line starting at `(x, y)`.
    fn wave(&mut self, x: f32, y: f32, width: f32, amplitude: f32, style: &Style);
    fn circle(&mut self, cx: f32, cy: f32, r: f32, style: &Style);
    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, style: &Style);
    fn text(&mut self, x: f32, y: f32, content: &str, style: &TextStyle);
    /// Draws a d3-style top axis for `scale` with its baseline at `y`.
    fn axis_top(&mut self, scale: &LinearScale, y: f32, font_size: f32);
    /// Genomic-position ruler. Pointer moves over `hit` place a vertical
    /// guide spanning `guide` (top and bottom y) and a label at `label_y`
    /// showing [`Ruler::position_at`] for the pointer offset.
    fn ruler(
        &mut self,
        ruler: &Ruler,
        hit: &ViewBox,
        guide: (f32, f32),
        label_y: f32,
        style: &Style,
        label: &TextStyle,
    );
    fn finish(self) -> String
    where
        Self: Sized;
}

const AXIS_TICK_SIZE: f32 = 6.0;
const AXIS_TICK_PADDING: f32 = 3.0;

const RULER_SCRIPT_ID: &str = "spliceview-ruler-script";
const RULER_LABEL_OFFSET: f32 = 5.0;
const RULER_SCRIPT: &str = r#"
function spliceviewRuler(evt) {
  var hit = evt.currentTarget;
  var num = function (key) { return parseFloat(hit.getAttribute('data-' + key)); };
  var x = evt.offsetX;
  var bp = (x - 3 * num('margin')) * num('bp-per-px') * num('direction');
  var pos = Math.floor(num('origin') + bp);
  var right = x > num('box-width') / 2;
  var guide = hit.parentNode.querySelector('.ruler-guide');
  var label = hit.parentNode.querySelector('.ruler-label');
  guide.setAttribute('x1', x);
  guide.setAttribute('x2', x);
  guide.setAttribute('visibility', 'visible');
  label.setAttribute('transform', 'translate(' + (x + (right ? -5 : 5)) + ',0)');
  label.setAttribute('text-anchor', right ? 'end' : 'start');
  label.setAttribute('visibility', 'visible');
  label.textContent = pos.toLocaleString();
}
"#;

pub struct SvgCanvas {
    width: f32,
    height: f32,
    transform: Option<String>,
    defs: Definitions,
    defined: HashSet<String>,
    body: Group,
}

fn paint_id(prefix: &str, color: &str) -> String {
    let clean: String = color
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{prefix}-{clean}")
}

fn titled<T: Node>(mut node: T, style: &Style) -> T {
    if let Some(title) = &style.title {
        let mut element = Element::new("title");
        element.append(svg::node::Text::new(title.clone()));
        node.append(element);
    }
    node
}

fn styled<T: Node>(mut node: T, style: &Style) -> T {
    if let Some(fill) = &style.fill {
        node.assign("fill", fill.clone());
    }
    if let Some(stroke) = &style.stroke {
        node.assign("stroke", stroke.clone());
    }
    if let Some(width) = style.stroke_width {
        node.assign("stroke-width", width);
    }
    if let Some(opacity) = style.opacity {
        node.assign("opacity", opacity);
    }
    if let Some(class) = &style.class {
        node.assign("class", class.clone());
    }
    titled(node, style)
}

/// Quadratic-curve wave path; each half period spans `2 * amplitude` pixels.
pub fn wave_path(x: f32, y: f32, width: f32, amplitude: f32) -> String {
    let mut d = format!("M{x},{y}");
    if amplitude <= 0.0 {
        d.push_str(&format!(" H{}", x + width));
        return d;
    }
    let step = 2.0 * amplitude;
    let mut cursor = x;
    let mut up = true;
    let end = x + width;
    while cursor < end {
        let next = (cursor + step).min(end);
        let amp = amplitude * (next - cursor) / step;
        let cy = if up { y - amp } else { y + amp };
        d.push_str(&format!(" Q{},{cy} {next},{y}", (cursor + next) / 2.0));
        cursor = next;
        up = !up;
    }
    d
}

impl SvgCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            transform: None,
            defs: Definitions::new(),
            defined: HashSet::new(),
            body: Group::new(),
        }
    }

    /// Applies a transform to everything drawn on this canvas.
    pub fn set_transform(&mut self, transform: impl Into<String>) {
        self.transform = Some(transform.into());
    }

    /// Adds an arbitrary element, e.g. a pre-built group.
    pub fn push<T: Into<Box<dyn Node>>>(&mut self, node: T) {
        self.body.append(node);
    }
}

impl Canvas for SvgCanvas {
    fn define_gradient(&mut self, color: &str) -> String {
        let id = paint_id("gradient", color);
        if self.defined.insert(id.clone()) {
            let gradient = LinearGradient::new()
                .set("id", id.clone())
                .set("x1", "0%")
                .set("y1", "0%")
                .set("x2", "0%")
                .set("y2", "100%")
                .add(Stop::new().set("offset", "0%").set("stop-color", "white"))
                .add(Stop::new().set("offset", "100%").set("stop-color", color));
            self.defs.append(gradient);
        }
        format!("url(#{id})")
    }

    fn define_pattern(&mut self, color: &str, stroke_width: f32) -> String {
        let id = paint_id("hatch", &format!("{color}-{stroke_width}"));
        if self.defined.insert(id.clone()) {
            let pattern = Pattern::new()
                .set("id", id.clone())
                .set("patternUnits", "userSpaceOnUse")
                .set("width", 4)
                .set("height", 4)
                .add(
                    Path::new()
                        .set("d", "M-1,1 l2,-2 M0,4 l4,-4 M3,5 l2,-2")
                        .set("stroke", color)
                        .set("stroke-width", stroke_width),
                );
            self.defs.append(pattern);
        }
        format!("url(#{id})")
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, style: &Style) {
        let mut rect = Rectangle::new()
            .set("x", x)
            .set("y", y)
            .set("width", width.max(0.0))
            .set("height", height.max(0.0));
        if let Some(r) = style.corner_radius {
            rect = rect.set("rx", r).set("ry", r);
        }
        self.body.append(styled(rect, style));
    }

    fn wave(&mut self, x: f32, y: f32, width: f32, amplitude: f32, style: &Style) {
        let path = Path::new()
            .set("d", wave_path(x, y, width, amplitude))
            .set("fill", "none");
        self.body.append(styled(path, style));
    }

    fn circle(&mut self, cx: f32, cy: f32, r: f32, style: &Style) {
        let circle = Circle::new().set("cx", cx).set("cy", cy).set("r", r);
        self.body.append(styled(circle, style));
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, style: &Style) {
        let line = Line::new()
            .set("x1", x1)
            .set("y1", y1)
            .set("x2", x2)
            .set("y2", y2);
        self.body.append(styled(line, style));
    }

    fn text(&mut self, x: f32, y: f32, content: &str, style: &TextStyle) {
        let mut text = Text::new(content)
            .set("x", x)
            .set("y", y)
            .set("font-family", "sans-serif")
            .set("font-size", style.font_size)
            .set("text-anchor", style.anchor)
            .set("fill", style.fill.clone());
        if style.bold {
            text = text.set("font-weight", "bold");
        }
        if style.vertical_center {
            text = text.set("dominant-baseline", "middle");
        }
        self.body.append(text);
    }

    fn axis_top(&mut self, scale: &LinearScale, y: f32, font_size: f32) {
        let (r0, r1) = scale.range();
        let mut axis = Group::new()
            .set("transform", format!("translate(0,{y})"))
            .set("fill", "none")
            .set("font-size", font_size)
            .set("font-family", "sans-serif")
            .set("text-anchor", "middle")
            .add(
                Path::new()
                    .set("class", "domain")
                    .set("stroke", "currentColor")
                    .set("d", format!("M{r0},{}V0H{r1}V{}", -AXIS_TICK_SIZE, -AXIS_TICK_SIZE)),
            );
        for value in scale.ticks(10) {
            let x = scale.apply(value);
            let tick = Group::new()
                .set("class", "tick")
                .set("transform", format!("translate({x},0)"))
                .add(Line::new().set("stroke", "currentColor").set("y2", -AXIS_TICK_SIZE))
                .add(
                    Text::new(format_position(value))
                        .set("fill", "currentColor")
                        .set("y", -(AXIS_TICK_SIZE + AXIS_TICK_PADDING)),
                );
            axis = axis.add(tick);
        }
        self.body.append(axis);
    }

    fn ruler(
        &mut self,
        ruler: &Ruler,
        hit: &ViewBox,
        guide: (f32, f32),
        label_y: f32,
        style: &Style,
        label: &TextStyle,
    ) {
        if self.defined.insert(RULER_SCRIPT_ID.to_string()) {
            let script = Script::new(RULER_SCRIPT)
                .set("id", RULER_SCRIPT_ID)
                .set("type", "text/javascript");
            self.body.append(script);
        }
        // Initial state points at the start of the gene box.
        let x = hit.x0() + ruler.margin;
        let right = ruler.label_anchor(x) == "end";
        let dx = if right { -RULER_LABEL_OFFSET } else { RULER_LABEL_OFFSET };
        let guide_line = Line::new()
            .set("class", "ruler-guide")
            .set("x1", x)
            .set("y1", guide.0)
            .set("x2", x)
            .set("y2", guide.1)
            .set("stroke", style.stroke.clone().unwrap_or_else(|| "gray".to_string()))
            .set("stroke-width", style.stroke_width.unwrap_or(1.0))
            .set("visibility", "hidden");
        let text = Text::new(format_position(ruler.position_at(x) as f64))
            .set("class", "ruler-label")
            .set("x", 0)
            .set("y", label_y)
            .set("transform", format!("translate({},0)", x + dx))
            .set("font-family", "sans-serif")
            .set("font-size", label.font_size)
            .set("text-anchor", ruler.label_anchor(x))
            .set("fill", label.fill.clone())
            .set("visibility", "hidden");
        let hit_rect = Rectangle::new()
            .set("class", "ruler-hit")
            .set("x", hit.x0())
            .set("y", hit.y0())
            .set("width", hit.width())
            .set("height", hit.height())
            .set("fill", "transparent")
            .set("data-origin", ruler.origin)
            .set("data-direction", ruler.direction)
            .set("data-bp-per-px", ruler.bp_per_px)
            .set("data-margin", ruler.margin)
            .set("data-box-width", ruler.box_width)
            .set("onmousemove", "spliceviewRuler(evt)");
        self.body.append(
            Group::new()
                .set("class", "ruler")
                .add(guide_line)
                .add(text)
                .add(hit_rect),
        );
    }

    fn finish(self) -> String {
        let mut body = self.body;
        if let Some(transform) = self.transform {
            body.assign("transform", transform);
        }
        let mut doc = Document::new()
            .set("viewBox", (0, 0, self.width, self.height))
            .set("width", self.width)
            .set("height", self.height);
        if !self.defined.is_empty() {
            doc = doc.add(self.defs);
        }
        doc.add(body).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locus::{Locus, Strand};

    #[test]
    fn view_box_padding_and_split() {
        let view = ViewBox::new(0.0, 0.0, 100.0, 200.0).add_padding(5.0, 5.0);
        assert_eq!((view.x0(), view.y0(), view.x1(), view.y1()), (5.0, 5.0, 95.0, 195.0));
        let rows = view.add_padding_y(45.0).split_y(4);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].y0(), 50.0);
        assert_eq!(rows[3].y1(), 150.0);
        assert!(view.split_y(0).is_empty());
        assert_eq!(view.with_height(40.0).size(), (90.0, 40.0));
        assert_eq!(ViewBox::new(0.0, 0.0, 4.0, 4.0).add_padding(5.0, 5.0).size(), (0.0, 0.0));
    }

    #[test]
    fn wave_path_covers_width() {
        let d = wave_path(10.0, 20.0, 20.0, 4.0);
        assert!(d.starts_with("M10,20"));
        assert!(d.ends_with("30,20"));
        assert_eq!(d.matches('Q').count(), 3);
    }

    #[test]
    fn paints_are_defined_once() {
        let mut canvas = SvgCanvas::new(100.0, 50.0);
        let a = canvas.define_gradient("green");
        let b = canvas.define_gradient("green");
        assert_eq!(a, b);
        assert_eq!(a, "url(#gradient-green)");
        let hatch = canvas.define_pattern("#0ff", 2.0);
        canvas.rect(0.0, 0.0, 10.0, 10.0, &Style::default().fill(hatch).title("domain"));
        let svg = canvas.finish();
        assert_eq!(svg.matches("<linearGradient").count(), 1);
        assert!(svg.contains("<pattern"));
        assert!(svg.contains("<title>"));
        assert!(svg.contains("domain"));
    }

    #[test]
    fn ruler_tracks_pointer_with_script() {
        let gene = Locus::new("g", 1, 1000, Strand::Reverse).unwrap();
        let ruler = Ruler::new(&gene, 496.0);
        let hit = ViewBox::new(10.0, 12.0, ruler.width(), 8.0);
        let mut canvas = SvgCanvas::new(520.0, 200.0);
        for _ in 0..2 {
            canvas.ruler(
                &ruler,
                &hit,
                (10.0, 180.0),
                45.0,
                &Style::default().stroke("gray", 1.0),
                &TextStyle::default(),
            );
        }
        let svg = canvas.finish();
        assert_eq!(svg.matches("<script").count(), 1);
        assert!(svg.contains("function spliceviewRuler(evt)"));
        assert_eq!(svg.matches("onmousemove=\"spliceviewRuler(evt)\"").count(), 2);
        assert!(svg.contains("class=\"ruler-guide\""));
        assert!(svg.contains("class=\"ruler-label\""));
        assert!(svg.contains("data-box-width=\"496\""));
        assert!(svg.contains("data-direction=\"-1\""));
        // Label starts at the gene box start, i.e. the gene end on the reverse strand.
        assert!(svg.contains(&format_position(ruler.position_at(12.0) as f64)));
        assert!(svg.contains("text-anchor=\"start\""));
    }

    #[test]
    fn axis_has_grouped_tick_labels() {
        let gene = Locus::new("g", 1000, 5000, Strand::Forward).unwrap();
        let scale = LinearScale::for_locus(&gene, 0.0, 400.0);
        let mut canvas = SvgCanvas::new(400.0, 50.0);
        canvas.axis_top(&scale, 20.0, 8.0);
        let svg = canvas.finish();
        assert!(svg.contains("1,000"));
        assert!(svg.contains("5,000"));
        assert!(svg.contains("class=\"tick\""));
    }
}
