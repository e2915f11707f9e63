//! Flowchart engine: parse, lay out, draw, and serialize to SVG.

pub mod collision;
pub mod document;
pub mod layout;
pub mod parser;
pub mod render;
pub mod shapes;
pub mod types;

pub use document::{assemble, placeholder};
pub use layout::{Layout, LayoutEngine};
pub use parser::{DiagramVariant, detect_variant, parse_flowchart};
pub use render::{RenderOptions, RenderOutcome, render_diagram, render_diagram_with_outcome};
pub use shapes::{Scene, render_scene};
pub use types::{EdgeStroke, FlowchartEdge, FlowchartNode, Graph, ShapeKind};
