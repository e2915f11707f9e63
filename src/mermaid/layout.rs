use std::collections::{HashMap, VecDeque};

use log::{debug, warn};

use super::types::*;

pub const DEFAULT_CANVAS_WIDTH: f32 = 800.0;
pub const TOP_MARGIN: f32 = 80.0;
pub const LAYER_SPACING: f32 = 120.0;
pub const LEFT_MARGIN: f32 = 50.0;
pub const MIN_HEIGHT: f32 = 400.0;
pub const VERTICAL_MARGINS: f32 = 80.0;

/// Bounding box for layout elements
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box of the given size centered on `center`.
    pub fn centered(center: Point, width: f32, height: f32) -> Self {
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.center_x(), self.center_y())
    }

    pub fn with_padding(&self, padding: f32) -> Self {
        Self::new(
            self.x - padding,
            self.y - padding,
            self.width + padding * 2.0,
            self.height + padding * 2.0,
        )
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Node ids per layer, each layer in graph insertion order.
pub type LayerAssignment = Vec<Vec<String>>;

/// Result of laying out one graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub layers: LayerAssignment,
    pub positions: HashMap<String, Point>,
    pub width: f32,
    pub height: f32,
}

impl Layout {
    /// Layer of a node, `None` for ids this layout never placed.
    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|n| n == id))
    }

    /// Center of a node, `None` for ids this layout never placed.
    pub fn position(&self, id: &str) -> Option<Point> {
        self.positions.get(id).copied()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

/// Layered top-down layout: breadth-first layers, evenly spread within a layer.
#[derive(Debug, Clone, Copy)]
pub struct LayoutEngine {
    canvas_width: f32,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
        }
    }
}

impl LayoutEngine {
    pub fn new(canvas_width: f32) -> Self {
        if !canvas_width.is_finite() || canvas_width < 2.0 * LEFT_MARGIN + 1.0 {
            warn!(requested = canvas_width; "Canvas width unusable, falling back to default");
            return Self::default();
        }
        Self { canvas_width }
    }

    pub fn canvas_width(&self) -> f32 {
        self.canvas_width
    }

    pub fn layout(&self, graph: &Graph) -> Layout {
        let layers = assign_layers(graph);

        let usable = self.canvas_width - 2.0 * LEFT_MARGIN;
        let mut positions = HashMap::with_capacity(graph.node_count());
        for (layer_idx, layer) in layers.iter().enumerate() {
            let y = TOP_MARGIN + layer_idx as f32 * LAYER_SPACING;
            let slots = (layer.len() + 1) as f32;
            for (i, id) in layer.iter().enumerate() {
                let x = LEFT_MARGIN + (i + 1) as f32 * usable / slots;
                positions.insert(id.clone(), Point::new(x, y));
            }
        }

        let height = MIN_HEIGHT.max(layers.len() as f32 * LAYER_SPACING + VERTICAL_MARGINS);
        debug!(layers = layers.len(), width = self.canvas_width, height = height; "Computed layout");

        Layout {
            layers,
            positions,
            width: self.canvas_width,
            height,
        }
    }
}

/// Breadth-first layering from the roots; the first visit fixes a node's layer.
///
/// Without roots (every node sits on a cycle) the first node seeds layer 0.
/// Nodes the traversal never reaches share one trailing layer.
pub fn assign_layers(graph: &Graph) -> LayerAssignment {
    let count = graph.node_count();
    if count == 0 {
        return Vec::new();
    }

    let successors = graph.successors();
    let mut rank: Vec<Option<usize>> = vec![None; count];
    let mut queue: VecDeque<usize> = VecDeque::new();

    let in_degrees = graph.in_degrees();
    let roots: Vec<usize> = (0..count).filter(|&i| in_degrees[i] == 0).collect();
    if roots.is_empty() {
        rank[0] = Some(0);
        queue.push_back(0);
    } else {
        for root in roots {
            rank[root] = Some(0);
            queue.push_back(root);
        }
    }

    while let Some(node) = queue.pop_front() {
        let depth = rank[node].unwrap_or(0);
        for &next in &successors[node] {
            if rank[next].is_none() {
                rank[next] = Some(depth + 1);
                queue.push_back(next);
            }
        }
    }

    let reached_depth = rank.iter().flatten().copied().max().unwrap_or(0);
    let mut layers: LayerAssignment = vec![Vec::new(); reached_depth + 1];
    let mut unreached = Vec::new();
    for (node, r) in graph.nodes().iter().zip(&rank) {
        match r {
            Some(r) => layers[*r].push(node.id.clone()),
            None => unreached.push(node.id.clone()),
        }
    }
    if !unreached.is_empty() {
        debug!(count = unreached.len(); "Placing unreached nodes in a trailing layer");
        layers.push(unreached);
    }
    layers
}
