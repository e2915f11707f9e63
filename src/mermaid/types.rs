use std::collections::HashMap;

/// Node shapes in flowcharts, selected by the bracket pair of the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeKind {
    /// `id[label]`
    #[default]
    Rectangle,
    /// `id(label)`
    Rounded,
    /// `id{label}`
    Diamond,
}

impl ShapeKind {
    /// Bracket priority used when a token could be read more than one way.
    pub const PRIORITY: [ShapeKind; 3] = [ShapeKind::Rectangle, ShapeKind::Rounded, ShapeKind::Diamond];

    pub fn brackets(self) -> (char, char) {
        match self {
            ShapeKind::Rectangle => ('[', ']'),
            ShapeKind::Rounded => ('(', ')'),
            ShapeKind::Diamond => ('{', '}'),
        }
    }
}

/// Line styles for edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeStroke {
    #[default]
    Solid,
    Dotted,
    Thick,
}

/// A node in a flowchart
#[derive(Debug, Clone, PartialEq)]
pub struct FlowchartNode {
    pub id: String,
    pub label: String,
    pub shape: ShapeKind,
}

impl FlowchartNode {
    /// Text shown inside the shape. Implicitly created nodes show their id.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// An edge connecting two nodes
#[derive(Debug, Clone, PartialEq)]
pub struct FlowchartEdge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub stroke: EdgeStroke,
    pub arrow: bool,
}

impl FlowchartEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
            stroke: EdgeStroke::Solid,
            arrow: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A flowchart as a directed graph.
///
/// Nodes keep insertion order and ids are unique. Every edge endpoint names a
/// node of the same graph: [`Graph::add_edge`] creates missing endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<FlowchartNode>,
    index: HashMap<String, usize>,
    edges: Vec<FlowchartEdge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[FlowchartNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[FlowchartEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&FlowchartNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Position of a node in insertion order.
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declare a node. Redeclaring an id overwrites its label and shape.
    pub fn declare_node(&mut self, id: &str, label: &str, shape: ShapeKind) {
        match self.index.get(id) {
            Some(&i) => {
                let node = &mut self.nodes[i];
                node.label = label.to_string();
                node.shape = shape;
            }
            None => self.push_node(id, label, shape),
        }
    }

    /// Make sure a node exists without touching an existing declaration.
    pub fn ensure_node(&mut self, id: &str) {
        if !self.index.contains_key(id) {
            self.push_node(id, "", ShapeKind::default());
        }
    }

    pub fn add_edge(&mut self, edge: FlowchartEdge) {
        self.ensure_node(&edge.from);
        self.ensure_node(&edge.to);
        self.edges.push(edge);
    }

    /// Number of edges pointing at each node, keyed by insertion index.
    pub fn in_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.nodes.len()];
        for edge in &self.edges {
            if let Some(&i) = self.index.get(&edge.to) {
                degrees[i] += 1;
            }
        }
        degrees
    }

    /// Outgoing neighbours of every node in edge declaration order.
    pub fn successors(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            if let (Some(&from), Some(&to)) = (self.index.get(&edge.from), self.index.get(&edge.to)) {
                out[from].push(to);
            }
        }
        out
    }

    fn push_node(&mut self, id: &str, label: &str, shape: ShapeKind) {
        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(FlowchartNode {
            id: id.to_string(),
            label: label.to_string(),
            shape,
        });
    }
}
