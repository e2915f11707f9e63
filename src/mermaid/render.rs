use log::{debug, info};

use super::document::{assemble, placeholder};
use super::layout::{DEFAULT_CANVAS_WIDTH, LayoutEngine};
use super::parser::{DiagramVariant, detect_variant, parse_flowchart};
use super::shapes::render_scene;

pub const STATIC_NOTICE: &str = "(Diagram converted to static representation)";
pub const EMPTY_NOTICE: &str = "No diagram content found";

/// The one knob the engine exposes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub canvas_width: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
        }
    }
}

/// What [`render_diagram_with_outcome`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered { nodes: usize, edges: usize },
    /// A recognised diagram type that is drawn as a labelled stand-in.
    Unsupported(&'static str),
    /// Nothing in the source could be read as a node.
    Empty,
}

impl RenderOutcome {
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, RenderOutcome::Rendered { .. })
    }
}

/// Render diagram source to a self-contained SVG document.
///
/// Never fails: unsupported or empty input yields a placeholder document.
pub fn render_diagram(source: &str, options: &RenderOptions) -> String {
    render_diagram_with_outcome(source, options).0
}

pub fn render_diagram_with_outcome(source: &str, options: &RenderOptions) -> (String, RenderOutcome) {
    let variant = detect_variant(source);
    if let DiagramVariant::Unsupported(name) = variant {
        info!(variant = name; "Unsupported diagram type, emitting placeholder");
        return (
            placeholder(variant, STATIC_NOTICE, source.trim()),
            RenderOutcome::Unsupported(name),
        );
    }

    let graph = parse_flowchart(source);
    if graph.is_empty() {
        debug!("No nodes found, emitting placeholder");
        return (
            placeholder(variant, EMPTY_NOTICE, source.trim()),
            RenderOutcome::Empty,
        );
    }

    let layout = LayoutEngine::new(options.canvas_width).layout(&graph);
    let mut scene = render_scene(&graph, &layout);
    scene.resolve_collisions();
    let svg = assemble(&scene, layout.width, layout.height);

    (
        svg,
        RenderOutcome::Rendered {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_flowchart() {
        let (svg, outcome) = render_diagram_with_outcome(
            "flowchart TD\nA[Start] --> B[Process] --> C{Done?}",
            &RenderOptions::default(),
        );

        assert_eq!(outcome, RenderOutcome::Rendered { nodes: 3, edges: 2 });
        assert!(svg.contains("<svg"));
        assert!(svg.contains(">Start</text>"));
        assert_eq!(svg.matches("<polygon").count(), 1);
        assert_eq!(svg.matches("<path d=").count(), 2);
    }

    #[test]
    fn test_empty_input_gives_placeholder() {
        for source in ["", "   \n\n", "%% just a comment", "flowchart TD"] {
            let (svg, outcome) = render_diagram_with_outcome(source, &RenderOptions::default());
            assert_eq!(outcome, RenderOutcome::Empty);
            assert!(svg.contains(EMPTY_NOTICE));
            assert!(svg.ends_with("</svg>"));
        }
    }

    #[test]
    fn test_unsupported_variant_short_circuits() {
        let source = "sequenceDiagram\n    Alice->>Bob: Hello";
        let (svg, outcome) = render_diagram_with_outcome(source, &RenderOptions::default());

        assert_eq!(outcome, RenderOutcome::Unsupported("Sequence Diagram"));
        assert!(outcome.is_placeholder());
        assert!(svg.contains(">Sequence Diagram</text>"));
        assert!(svg.contains(STATIC_NOTICE));
        assert!(svg.contains("Alice-&gt;&gt;Bob"));
        assert!(svg.contains("stroke: #388e3c"));
    }

    #[test]
    fn test_canvas_width_option() {
        let narrow = render_diagram("A --> B", &RenderOptions { canvas_width: 400.0 });
        assert!(narrow.contains(r#"width="400.00""#));

        let invalid = render_diagram("A --> B", &RenderOptions { canvas_width: f32::INFINITY });
        assert!(invalid.contains(r#"width="800.00""#));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let source = "A --> B & C\nB --> D\nC --> D\nD --> A";
        let options = RenderOptions::default();
        assert_eq!(render_diagram(source, &options), render_diagram(source, &options));
    }
}
