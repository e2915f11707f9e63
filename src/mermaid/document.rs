use std::fmt::Write as _;

use super::layout::BBox;
use super::parser::{CLASS_DIAGRAM, DiagramVariant, SEQUENCE_DIAGRAM};
use super::shapes::{CORNER_RADIUS, Connector, Scene, ShapePrimitive, TextRun};
use super::types::{EdgeStroke, ShapeKind};
use crate::xml::escape_xml;

/// Space kept between the content and the canvas edge.
pub const CANVAS_MARGIN: f32 = 20.0;
pub const PLACEHOLDER_WIDTH: f32 = 600.0;
pub const PLACEHOLDER_HEIGHT: f32 = 300.0;
/// Characters of the original source quoted on a placeholder.
pub const HINT_CHARS: usize = 50;

/// Fill, border and text colors of a placeholder card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Palette {
    fill: &'static str,
    stroke: &'static str,
    text: &'static str,
}

impl Palette {
    const DEFAULT: Self = Self {
        fill: "#e3f2fd",
        stroke: "#1976d2",
        text: "#0d47a1",
    };
    const CLASS: Self = Self {
        fill: "#f3e5f5",
        stroke: "#7b1fa2",
        text: "#4a148c",
    };
    const SEQUENCE: Self = Self {
        fill: "#e8f5e9",
        stroke: "#388e3c",
        text: "#1b5e20",
    };

    fn for_variant(variant: DiagramVariant) -> Self {
        match variant {
            DiagramVariant::Unsupported(CLASS_DIAGRAM) => Self::CLASS,
            DiagramVariant::Unsupported(SEQUENCE_DIAGRAM) => Self::SEQUENCE,
            _ => Self::DEFAULT,
        }
    }
}

/// Colors and fonts baked into every document's style block.
#[derive(Debug, Clone)]
struct DiagramStyle {
    node_fill: &'static str,
    node_stroke: &'static str,
    node_text: &'static str,
    edge_stroke: &'static str,
    edge_text: &'static str,
    background: &'static str,
    font_family: &'static str,
    font_size: f32,
    placeholder: Palette,
}

impl Default for DiagramStyle {
    fn default() -> Self {
        Self {
            node_fill: "#e1f5fe",
            node_stroke: "#01579b",
            node_text: "#01579b",
            edge_stroke: "#546e7a",
            edge_text: "#37474f",
            background: "#ffffff",
            font_family: "'Segoe UI', Arial, sans-serif",
            font_size: 14.0,
            placeholder: Palette::DEFAULT,
        }
    }
}

impl DiagramStyle {
    /// The `<style>` element shared by every primitive of a document.
    fn stylesheet(&self) -> String {
        let mut css = String::from(r#"<style type="text/css">"#);
        let _ = write!(
            css,
            ".fc-background {{ fill: {bg}; }} \
             .fc-node {{ fill: {nf}; stroke: {ns}; stroke-width: 2px; }} \
             .fc-label {{ fill: {nt}; font-family: {ff}; font-size: {fs:.1}px; font-weight: 500; }} \
             .fc-edge {{ stroke: {es}; stroke-width: 2px; fill: none; }} \
             .fc-edge-dotted {{ stroke-dasharray: 3,4; }} \
             .fc-edge-thick {{ stroke-width: 3.5px; }} \
             .fc-edge-label {{ fill: {et}; font-family: {ff}; font-size: {efs:.1}px; }} \
             .fc-label-bg {{ fill: {bg}; opacity: 0.85; }} \
             .arrow-marker {{ fill: {es}; }} \
             .fc-placeholder {{ fill: {pf}; stroke: {ps}; stroke-width: 2px; }} \
             .fc-placeholder-icon {{ fill: {bg}; stroke: {ps}; stroke-width: 2px; }} \
             .fc-placeholder-title {{ fill: {pt}; font-family: {ff}; font-size: 18px; font-weight: bold; }} \
             .fc-placeholder-notice {{ fill: {pt}; font-family: {ff}; font-size: 14px; opacity: 0.8; }} \
             .fc-placeholder-hint {{ fill: {pt}; font-family: monospace; font-size: 10px; opacity: 0.5; }}",
            bg = self.background,
            nf = self.node_fill,
            ns = self.node_stroke,
            nt = self.node_text,
            ff = self.font_family,
            fs = self.font_size,
            es = self.edge_stroke,
            et = self.edge_text,
            efs = self.font_size * 0.85,
            pf = self.placeholder.fill,
            ps = self.placeholder.stroke,
            pt = self.placeholder.text,
        );
        css.push_str("</style>");
        css
    }
}

const ARROW_MARKER: &str = r#"<marker id="arrow" markerWidth="10" markerHeight="10" refX="9" refY="3" orient="auto" markerUnits="strokeWidth"><path d="M0,0 L0,6 L9,3 z" class="arrow-marker"/></marker>"#;

fn open_document(svg: &mut String, canvas: &BBox, style: &DiagramStyle) {
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.2}" height="{:.2}" viewBox="{:.2} {:.2} {:.2} {:.2}" class="flowsvg">"#,
        canvas.width, canvas.height, canvas.x, canvas.y, canvas.width, canvas.height
    );
    let _ = write!(svg, "<defs>{}{}</defs>", style.stylesheet(), ARROW_MARKER);
}

/// Canvas grown to contain every primitive plus the margin.
pub fn canvas_for(scene: &Scene, width: f32, height: f32) -> BBox {
    let requested = BBox::new(0.0, 0.0, width, height);
    match scene.bounds() {
        Some(bounds) => requested.union(&bounds.with_padding(CANVAS_MARGIN)),
        None => requested,
    }
}

/// Serialize a scene into a self-contained SVG document.
///
/// Connectors come first so shapes paint over them, then shapes, then text.
pub fn assemble(scene: &Scene, canvas_width: f32, canvas_height: f32) -> String {
    let canvas = canvas_for(scene, canvas_width, canvas_height);

    let mut svg = String::new();
    open_document(&mut svg, &canvas, &DiagramStyle::default());
    let _ = write!(
        svg,
        r#"<rect class="fc-background" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/>"#,
        canvas.x, canvas.y, canvas.width, canvas.height
    );

    svg.push_str(r#"<g class="fc-connectors">"#);
    for connector in &scene.connectors {
        svg.push_str(&render_connector(connector));
    }
    svg.push_str(r#"</g><g class="fc-shapes">"#);
    for shape in &scene.shapes {
        svg.push_str(&render_shape(shape));
    }
    svg.push_str(r#"</g><g class="fc-labels">"#);
    for text in &scene.texts {
        svg.push_str(&render_text(text));
    }
    svg.push_str("</g></svg>");

    svg
}

fn render_connector(connector: &Connector) -> String {
    let (s, e) = (connector.start, connector.end);
    let path = match connector.loop_controls() {
        Some((c1, c2)) => format!(
            "M {:.2} {:.2} C {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}",
            s.x, s.y, c1.x, c1.y, c2.x, c2.y, e.x, e.y
        ),
        None => format!("M {:.2} {:.2} L {:.2} {:.2}", s.x, s.y, e.x, e.y),
    };

    let class = match connector.stroke {
        EdgeStroke::Solid => "fc-edge",
        EdgeStroke::Dotted => "fc-edge fc-edge-dotted",
        EdgeStroke::Thick => "fc-edge fc-edge-thick",
    };
    let marker = if connector.arrow {
        r#" marker-end="url(#arrow)""#
    } else {
        ""
    };

    format!(r#"<path d="{path}" class="{class}"{marker}/>"#)
}

fn render_shape(shape: &ShapePrimitive) -> String {
    let b = &shape.bbox;
    match shape.kind {
        ShapeKind::Rectangle => format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" class="fc-node"/>"#,
            b.x, b.y, b.width, b.height
        ),
        ShapeKind::Rounded => format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="{:.2}" class="fc-node"/>"#,
            b.x, b.y, b.width, b.height, CORNER_RADIUS
        ),
        ShapeKind::Diamond => {
            let [top, right, bottom, left] = shape.diamond_points();
            format!(
                r#"<polygon points="{:.2},{:.2} {:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" class="fc-node"/>"#,
                top.x, top.y, right.x, right.y, bottom.x, bottom.y, left.x, left.y
            )
        }
    }
}

fn render_text(text: &TextRun) -> String {
    let mut svg = String::new();
    let (x, y) = (text.position.x, text.position.y);

    let class = if text.is_edge_label() {
        let bg = text.bbox().with_padding(3.0);
        let _ = write!(
            svg,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="2" class="fc-label-bg"/>"#,
            bg.x, bg.y, bg.width, bg.height
        );
        "fc-edge-label"
    } else {
        "fc-label"
    };

    let _ = write!(
        svg,
        r#"<text x="{:.2}" y="{:.2}" class="{}" text-anchor="middle" dominant-baseline="middle">{}</text>"#,
        x,
        y,
        class,
        escape_xml(&text.content)
    );
    svg
}

/// A labelled stand-in document for diagrams that cannot be drawn.
///
/// The title and card colors follow `variant`; `source_hint` is quoted up to
/// [`HINT_CHARS`] characters.
pub fn placeholder(variant: DiagramVariant, notice: &str, source_hint: &str) -> String {
    let style = DiagramStyle {
        placeholder: Palette::for_variant(variant),
        ..DiagramStyle::default()
    };
    let title = variant.display_name();
    let canvas = BBox::new(0.0, 0.0, PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
    let cx = PLACEHOLDER_WIDTH / 2.0;

    let hint = source_hint.split_whitespace().collect::<Vec<_>>().join(" ");
    let hint = if hint.chars().count() > HINT_CHARS {
        format!("{}...", hint.chars().take(HINT_CHARS).collect::<String>())
    } else {
        hint
    };

    let mut svg = String::new();
    open_document(&mut svg, &canvas, &style);
    let _ = write!(
        svg,
        r#"<rect x="1.00" y="1.00" width="{:.2}" height="{:.2}" rx="8" class="fc-placeholder"/>"#,
        PLACEHOLDER_WIDTH - 2.0,
        PLACEHOLDER_HEIGHT - 2.0
    );
    // document icon
    let _ = write!(
        svg,
        r#"<g transform="translate({cx:.2}, 100.00)"><rect x="-40" y="-30" width="80" height="60" rx="5" class="fc-placeholder-icon"/><path d="M -20 -10 H 20 M -20 0 H 20 M -20 10 H 20" class="fc-placeholder-icon"/></g>"#
    );
    for (y, class, content) in [
        (180.0, "fc-placeholder-title", title),
        (210.0, "fc-placeholder-notice", notice),
        (240.0, "fc-placeholder-hint", hint.as_str()),
    ] {
        if content.is_empty() {
            continue;
        }
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" class="{}" text-anchor="middle">{}</text>"#,
            cx,
            y,
            class,
            escape_xml(content)
        );
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use quick_xml::Reader;
    use quick_xml::escape::resolve_predefined_entity;
    use quick_xml::events::Event;

    use super::*;
    use crate::mermaid::layout::LayoutEngine;
    use crate::mermaid::parser::parse_flowchart;
    use crate::mermaid::shapes::render_scene;

    fn assembled(source: &str) -> String {
        let graph = parse_flowchart(source);
        let layout = LayoutEngine::default().layout(&graph);
        let mut scene = render_scene(&graph, &layout);
        scene.resolve_collisions();
        assemble(&scene, layout.width, layout.height)
    }

    /// Every `<text>` body, unescaped.
    fn text_contents(svg: &str) -> Vec<String> {
        let mut reader = Reader::from_str(svg);
        let mut current: Option<String> = None;
        let mut out = Vec::new();
        loop {
            match reader.read_event().expect("well-formed svg") {
                Event::Start(e) if e.name().as_ref() == b"text" => current = Some(String::new()),
                Event::End(e) if e.name().as_ref() == b"text" => out.extend(current.take()),
                Event::Text(t) => {
                    if let Some(buf) = current.as_mut() {
                        buf.push_str(&t.decode().expect("utf-8 text"));
                    }
                }
                Event::GeneralRef(r) => {
                    if let Some(buf) = current.as_mut() {
                        let name = r.decode().expect("utf-8 entity");
                        buf.push_str(resolve_predefined_entity(&name).expect("predefined entity"));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        out
    }

    #[test]
    fn assemble_is_idempotent() {
        let graph = parse_flowchart("A[Start] --> B{Ok?}\nB -->|yes| C(Done)\nB --> A");
        let layout = LayoutEngine::default().layout(&graph);
        let mut scene = render_scene(&graph, &layout);
        scene.resolve_collisions();

        let first = assemble(&scene, layout.width, layout.height);
        let second = assemble(&scene, layout.width, layout.height);
        assert_eq!(first, second);
    }

    #[test]
    fn document_has_one_marker_and_layered_groups() {
        let svg = assembled("A --> B\nA --> C\nB --> C");

        assert!(svg.starts_with("<svg "));
        assert_eq!(svg.matches(r#"<marker id="arrow""#).count(), 1);
        assert_eq!(svg.matches("<style").count(), 1);
        assert_eq!(svg.matches(r#"marker-end="url(#arrow)""#).count(), 3);

        let connectors = svg.find("fc-connectors").unwrap();
        let shapes = svg.find("fc-shapes").unwrap();
        let labels = svg.find("fc-labels").unwrap();
        assert!(connectors < shapes && shapes < labels);
        assert!(!svg.contains("<script"));
    }

    #[test]
    fn root_declares_size_and_viewbox() {
        let svg = assembled("A --> B");
        assert!(svg.contains(r#"width="800.00" height="400.00" viewBox="0.00 0.00 800.00 400.00""#));
    }

    #[test]
    fn script_label_is_escaped_and_round_trips() {
        let svg = assembled("A[<script>] --> B[\"Tom & 'Jerry' show\"]");

        assert!(!svg.contains("<script>"));
        assert!(svg.contains("&lt;script&gt;"));
        let texts = text_contents(&svg);
        assert!(texts.contains(&"<script>".to_string()));
        assert!(texts.contains(&"Tom & 'Jerry' show".to_string()));
    }

    #[test]
    fn diamond_renders_as_four_point_polygon() {
        let svg = assembled("C{Done?}");
        let start = svg.find("<polygon points=\"").unwrap() + "<polygon points=\"".len();
        let end = start + svg[start..].find('"').unwrap();
        assert_eq!(svg[start..end].split(' ').count(), 4);
    }

    #[test]
    fn stroke_styles_map_to_classes() {
        let svg = assembled("A -.-> B\nB ==> C\nC --- D");
        assert!(svg.contains(r#"class="fc-edge fc-edge-dotted" marker-end"#));
        assert!(svg.contains(r#"class="fc-edge fc-edge-thick" marker-end"#));
        assert_eq!(svg.matches("marker-end").count(), 2);
    }

    #[test]
    fn canvas_grows_to_fit_wide_content() {
        let label = "w".repeat(120);
        let svg = assembled(&format!("A[{label}] --> B"));
        // 120 chars need 980px, wider than the 800px request
        assert!(!svg.contains(r#"width="800.00""#));
        assert!(svg.contains(r#"viewBox="-"#));
    }

    #[test]
    fn placeholder_is_well_formed_and_truncates_hint() {
        let hint = format!("sequenceDiagram {}", "x".repeat(80));
        let svg = placeholder(
            DiagramVariant::Unsupported(SEQUENCE_DIAGRAM),
            "(Diagram converted to static representation)",
            &hint,
        );

        assert!(svg.contains(r#"viewBox="0.00 0.00 600.00 300.00""#));
        let texts = text_contents(&svg);
        assert_eq!(texts[0], "Sequence Diagram");
        assert!(texts[2].ends_with("..."));
        assert_eq!(texts[2].chars().count(), HINT_CHARS + 3);
    }

    #[test]
    fn every_document_parses_as_xml() {
        for svg in [
            assembled("A[a & b] --> B(<b>) --> C{\"c\"}"),
            assembled("A --> A"),
            placeholder(DiagramVariant::Flowchart, "No <diagram> content found", "& < >"),
        ] {
            text_contents(&svg);
        }
    }

    #[test]
    fn placeholder_colors_follow_variant() {
        let class = placeholder(DiagramVariant::Unsupported(CLASS_DIAGRAM), "", "");
        let sequence = placeholder(DiagramVariant::Unsupported(SEQUENCE_DIAGRAM), "", "");
        let gantt = placeholder(DiagramVariant::Unsupported("Gantt Chart"), "", "");
        let empty = placeholder(DiagramVariant::Flowchart, "", "");

        assert!(class.contains("stroke: #7b1fa2"));
        assert!(sequence.contains("stroke: #388e3c"));
        assert!(gantt.contains("stroke: #1976d2"));
        assert!(empty.contains("stroke: #1976d2"));
        assert_eq!(text_contents(&class), ["Class Diagram"]);
        assert_eq!(text_contents(&empty), ["Flowchart"]);
    }
}
