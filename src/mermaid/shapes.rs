use std::collections::HashMap;

use log::{trace, warn};

use super::collision;
use super::layout::{BBox, Layout, Point};
use super::types::*;
use crate::xml::sanitized_char_count;

/// Estimated advance of one label character.
pub const CHAR_WIDTH: f32 = 8.0;
pub const LABEL_PADDING: f32 = 20.0;
pub const MIN_WIDTH: f32 = 120.0;
pub const NODE_HEIGHT: f32 = 50.0;
pub const CORNER_RADIUS: f32 = 10.0;
/// Sideways distance between parallel connectors.
pub const LANE_GAP: f32 = 14.0;
/// How far a self-loop reaches past the shape's right edge.
pub const LOOP_REACH: f32 = 36.0;
pub const LABEL_HEIGHT: f32 = 18.0;

/// A node's outline, in canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapePrimitive {
    pub node_id: String,
    pub kind: ShapeKind,
    pub bbox: BBox,
}

impl ShapePrimitive {
    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    /// Top, right, bottom and left midpoints of the bounding box.
    pub fn diamond_points(&self) -> [Point; 4] {
        let b = &self.bbox;
        [
            Point::new(b.center_x(), b.y),
            Point::new(b.right(), b.center_y()),
            Point::new(b.center_x(), b.bottom()),
            Point::new(b.x, b.center_y()),
        ]
    }

    /// Where a ray from the center at `angle` leaves the outline.
    pub fn boundary_point(&self, angle: f32) -> Point {
        match self.kind {
            ShapeKind::Diamond => diamond_boundary_point(&self.bbox, angle),
            ShapeKind::Rectangle | ShapeKind::Rounded => rect_boundary_point(&self.bbox, angle),
        }
    }
}

fn rect_boundary_point(rect: &BBox, angle: f32) -> Point {
    let center = rect.center();
    let dx = angle.cos();
    let dy = angle.sin();
    let half_w = rect.width / 2.0;
    let half_h = rect.height / 2.0;

    let tx = if dx.abs() > 1e-5 {
        half_w / dx.abs()
    } else {
        f32::INFINITY
    };
    let ty = if dy.abs() > 1e-5 {
        half_h / dy.abs()
    } else {
        f32::INFINITY
    };
    let t = tx.min(ty);

    Point::new(center.x + dx * t, center.y + dy * t)
}

fn diamond_boundary_point(rect: &BBox, angle: f32) -> Point {
    let center = rect.center();
    let dx = angle.cos();
    let dy = angle.sin();
    let half_w = (rect.width / 2.0).max(f32::EPSILON);
    let half_h = (rect.height / 2.0).max(f32::EPSILON);

    // |x|/hw + |y|/hh = 1
    let t = 1.0 / (dx.abs() / half_w + dy.abs() / half_h);
    Point::new(center.x + dx * t, center.y + dy * t)
}

/// A line (or self-loop) between two shapes of the same scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    /// Index of the source shape in [`Scene::shapes`].
    pub source: usize,
    /// Index of the target shape in [`Scene::shapes`].
    pub target: usize,
    pub stroke: EdgeStroke,
    pub arrow: bool,
    /// Signed sideways offset for parallel edges, in pixels.
    pub lane_offset: f32,
    pub start: Point,
    pub end: Point,
}

impl Connector {
    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }

    /// Recompute the endpoints from the current shape outlines.
    pub fn route(&mut self, source: &ShapePrimitive, target: &ShapePrimitive) {
        if self.is_loop() {
            let b = &source.bbox;
            let spread = b.height / 4.0;
            self.start = Point::new(b.right(), b.center_y() - spread);
            self.end = Point::new(b.right(), b.center_y() + spread);
            return;
        }

        let from = source.center();
        let to = target.center();
        let angle = (to.y - from.y).atan2(to.x - from.x);
        let start = source.boundary_point(angle);
        let end = target.boundary_point(angle + std::f32::consts::PI);

        // perpendicular unit vector
        let (nx, ny) = (-angle.sin(), angle.cos());
        self.start = Point::new(start.x + nx * self.lane_offset, start.y + ny * self.lane_offset);
        self.end = Point::new(end.x + nx * self.lane_offset, end.y + ny * self.lane_offset);
    }

    /// Bezier control points of a self-loop, `None` for straight connectors.
    pub fn loop_controls(&self) -> Option<(Point, Point)> {
        if !self.is_loop() {
            return None;
        }
        let reach = LOOP_REACH + self.lane_offset.abs();
        Some((
            Point::new(self.start.x + reach, self.start.y - reach / 2.0),
            Point::new(self.end.x + reach, self.end.y + reach / 2.0),
        ))
    }

    /// Where an edge label sits.
    pub fn label_anchor(&self) -> Point {
        match self.loop_controls() {
            Some((c1, _)) => Point::new(c1.x, (self.start.y + self.end.y) / 2.0),
            None => Point::new(
                (self.start.x + self.end.x) / 2.0,
                (self.start.y + self.end.y) / 2.0,
            ),
        }
    }

    pub fn bbox(&self) -> BBox {
        let mut points = vec![self.start, self.end];
        if let Some((c1, c2)) = self.loop_controls() {
            points.extend([c1, c2]);
        }
        bbox_of(&points)
    }
}

fn bbox_of(points: &[Point]) -> BBox {
    let min_x = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_x = points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    BBox::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

/// What a text run follows when shapes move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Shape(usize),
    Connector(usize),
}

/// A centered run of label text. `content` is raw; escaping happens on output.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub position: Point,
    pub content: String,
    pub anchor: TextAnchor,
}

impl TextRun {
    pub fn is_edge_label(&self) -> bool {
        matches!(self.anchor, TextAnchor::Connector(_))
    }

    /// Estimated footprint, centered on the position.
    pub fn bbox(&self) -> BBox {
        BBox::centered(self.position, text_width(&self.content), LABEL_HEIGHT)
    }
}

fn text_width(text: &str) -> f32 {
    sanitized_char_count(text) as f32 * CHAR_WIDTH
}

/// Width of the box drawn around a label.
pub fn label_box_width(label: &str) -> f32 {
    let width = text_width(label) + LABEL_PADDING;
    if !width.is_finite() {
        warn!(chars = label.len(); "Label width is not finite, using minimum width");
        return MIN_WIDTH;
    }
    width.max(MIN_WIDTH)
}

/// Every primitive of one diagram.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub shapes: Vec<ShapePrimitive>,
    pub connectors: Vec<Connector>,
    pub texts: Vec<TextRun>,
}

impl Scene {
    /// Move overlapping shapes apart, then re-anchor everything attached to them.
    pub fn resolve_collisions(&mut self) {
        self.shapes = collision::resolve(&self.shapes);
        self.reanchor();
    }

    /// Recompute connector endpoints and text positions from the current shapes.
    pub fn reanchor(&mut self) {
        for connector in &mut self.connectors {
            let (Some(source), Some(target)) = (
                self.shapes.get(connector.source),
                self.shapes.get(connector.target),
            ) else {
                continue;
            };
            connector.route(source, target);
        }

        for text in &mut self.texts {
            let anchor = match text.anchor {
                TextAnchor::Shape(i) => self.shapes.get(i).map(ShapePrimitive::center),
                TextAnchor::Connector(i) => self.connectors.get(i).map(Connector::label_anchor),
            };
            if let Some(position) = anchor {
                text.position = position;
            }
        }
    }

    /// Union of every primitive's footprint, `None` for an empty scene.
    pub fn bounds(&self) -> Option<BBox> {
        self.shapes
            .iter()
            .map(|s| s.bbox)
            .chain(self.connectors.iter().map(Connector::bbox))
            .chain(self.texts.iter().map(TextRun::bbox))
            .reduce(|acc, b| acc.union(&b))
    }
}

/// Outline for one node centered on its layout position.
pub fn render_node(node: &FlowchartNode, position: Point) -> ShapePrimitive {
    ShapePrimitive {
        node_id: node.id.clone(),
        kind: node.shape,
        bbox: BBox::centered(position, label_box_width(node.display_label()), NODE_HEIGHT),
    }
}

/// Build every primitive for a laid-out graph.
///
/// One shape and one text run per node in graph order, then one connector
/// (and a text run when labelled) per edge in edge order.
pub fn render_scene(graph: &Graph, layout: &Layout) -> Scene {
    let mut scene = Scene::default();

    for node in graph.nodes() {
        let position = layout.position(&node.id).unwrap_or_default();
        scene.shapes.push(render_node(node, position));
        scene.texts.push(TextRun {
            position,
            content: node.display_label().to_string(),
            anchor: TextAnchor::Shape(scene.shapes.len() - 1),
        });
    }

    let lanes = assign_lanes(graph);
    for (edge, lane_offset) in graph.edges().iter().zip(lanes) {
        let (Some(source), Some(target)) = (graph.node_index(&edge.from), graph.node_index(&edge.to))
        else {
            continue;
        };

        let mut connector = Connector {
            source,
            target,
            stroke: edge.stroke,
            arrow: edge.arrow,
            lane_offset,
            start: Point::default(),
            end: Point::default(),
        };
        connector.route(&scene.shapes[source], &scene.shapes[target]);
        let anchor = connector.label_anchor();
        scene.connectors.push(connector);

        if let Some(label) = edge.label.as_deref().filter(|l| !l.is_empty()) {
            scene.texts.push(TextRun {
                position: anchor,
                content: label.to_string(),
                anchor: TextAnchor::Connector(scene.connectors.len() - 1),
            });
        }
    }

    trace!(
        shapes = scene.shapes.len(),
        connectors = scene.connectors.len(),
        texts = scene.texts.len();
        "Rendered scene"
    );
    scene
}

/// Sideways offsets so edges between the same pair of nodes do not overlap.
///
/// Edges are grouped by unordered endpoint pair; a lone edge gets offset 0.
/// Offsets are measured against the canonical direction of the pair, so an
/// edge running the other way gets its sign flipped.
fn assign_lanes(graph: &Graph) -> Vec<f32> {
    let mut totals: HashMap<(&str, &str), usize> = HashMap::new();
    for edge in graph.edges() {
        *totals.entry(pair_key(edge)).or_default() += 1;
    }

    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
    graph
        .edges()
        .iter()
        .map(|edge| {
            let key = pair_key(edge);
            let total = totals.get(&key).copied().unwrap_or(1);
            let lane = seen.entry(key).or_default();
            let offset = (*lane as f32 - (total - 1) as f32 / 2.0) * LANE_GAP;
            *lane += 1;
            if edge.from.as_str() == key.0 || edge.from == edge.to {
                offset
            } else {
                -offset
            }
        })
        .collect()
}

fn pair_key(edge: &FlowchartEdge) -> (&str, &str) {
    let (a, b) = (edge.from.as_str(), edge.to.as_str());
    if a <= b { (a, b) } else { (b, a) }
}
