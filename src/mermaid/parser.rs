use log::{debug, trace};

use super::types::*;

/// Which renderer a block of mini-language source is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramVariant {
    Flowchart,
    /// A recognised diagram keyword this engine does not model.
    Unsupported(&'static str),
}

impl DiagramVariant {
    pub fn display_name(self) -> &'static str {
        match self {
            DiagramVariant::Flowchart => "Flowchart",
            DiagramVariant::Unsupported(name) => name,
        }
    }
}

pub const SEQUENCE_DIAGRAM: &str = "Sequence Diagram";
pub const CLASS_DIAGRAM: &str = "Class Diagram";

// Keyword, display name
const UNSUPPORTED_KEYWORDS: &[(&str, &str)] = &[
    ("sequenceDiagram", SEQUENCE_DIAGRAM),
    ("classDiagram", CLASS_DIAGRAM),
    ("classDiagram-v2", CLASS_DIAGRAM),
    ("stateDiagram", "State Diagram"),
    ("stateDiagram-v2", "State Diagram"),
    ("erDiagram", "Entity Relationship Diagram"),
    ("gantt", "Gantt Chart"),
    ("pie", "Pie Chart"),
    ("journey", "User Journey"),
    ("gitGraph", "Git Graph"),
    ("mindmap", "Mind Map"),
    ("timeline", "Timeline"),
    ("quadrantChart", "Quadrant Chart"),
    ("requirementDiagram", "Requirement Diagram"),
    ("C4Context", "C4 Diagram"),
    ("C4Container", "C4 Diagram"),
    ("C4Component", "C4 Diagram"),
    ("C4Dynamic", "C4 Diagram"),
    ("C4Deployment", "C4 Diagram"),
    ("sankey-beta", "Sankey Diagram"),
    ("xychart-beta", "XY Chart"),
    ("block-beta", "Block Diagram"),
];

// Statements starting with one of these words carry no nodes or edges.
const DIRECTIVES: &[&str] = &[
    "flowchart",
    "graph",
    "subgraph",
    "end",
    "direction",
    "style",
    "classDef",
    "class",
    "linkStyle",
    "click",
    "title",
    "accTitle",
    "accTitle:",
    "accDescr",
    "accDescr:",
];

/// Detect the diagram type from the first meaningful line.
///
/// Sources without a recognised keyword are treated as flowcharts.
pub fn detect_variant(source: &str) -> DiagramVariant {
    let Some((_, first)) = meaningful_lines(source).next() else {
        return DiagramVariant::Flowchart;
    };
    let keyword = first.split_whitespace().next().unwrap_or("");

    UNSUPPORTED_KEYWORDS
        .iter()
        .find(|(kw, _)| *kw == keyword)
        .map_or(DiagramVariant::Flowchart, |(_, name)| {
            DiagramVariant::Unsupported(name)
        })
}

/// Parse flowchart source into a graph.
///
/// Never fails: statements that cannot be read are skipped.
pub fn parse_flowchart(source: &str) -> Graph {
    let mut graph = Graph::new();

    for (line_no, line) in meaningful_lines(source) {
        for text in split_statements(line) {
            if is_directive(text) {
                trace!(line = line_no + 1; "Ignoring directive");
                continue;
            }

            match parse_statement(text) {
                Some(statement) => statement.apply(&mut graph),
                None => debug!(line = line_no + 1, text = text; "Skipping unparsable statement"),
            }
        }
    }

    debug!(nodes = graph.node_count(), edges = graph.edge_count(); "Parsed flowchart");
    graph
}

/// Trimmed, non-empty, non-comment lines after any front-matter block.
fn meaningful_lines(source: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut in_front_matter = false;
    let mut seen_content = false;

    source
        .lines()
        .enumerate()
        .map(|(i, line)| (i, line.trim()))
        .filter(move |&(_, line)| {
            if line.is_empty() || line.starts_with("%%") {
                return false;
            }
            if line == "---" && (in_front_matter || !seen_content) {
                in_front_matter = !in_front_matter;
                seen_content = true;
                return false;
            }
            seen_content = true;
            !in_front_matter
        })
}

fn is_directive(text: &str) -> bool {
    let word = text.split_whitespace().next().unwrap_or("");
    DIRECTIVES.contains(&word)
}

/// Split a line on `;` that sit outside brackets, pipes and quotes.
///
/// Only a `"` right after an opening bracket or pipe starts a quote.
fn split_statements(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut in_pipe = false;
    let mut start = 0;

    let mut prev = None;
    for (i, c) in line.char_indices() {
        let opens_quote = matches!(prev, Some('[' | '(' | '{' | '|'));
        prev = Some(c);
        match c {
            '"' if in_quote || opens_quote => in_quote = !in_quote,
            _ if in_quote => {}
            '|' if depth == 0 => in_pipe = !in_pipe,
            '[' | '(' | '{' if !in_pipe => depth += 1,
            ']' | ')' | '}' if !in_pipe => depth = depth.saturating_sub(1),
            ';' if depth == 0 && !in_pipe => {
                parts.push(line[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(line[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// A node token: an id with an optional bracketed declaration.
#[derive(Debug, Clone, PartialEq)]
struct NodeRef {
    id: String,
    declared: Option<(ShapeKind, String)>,
}

/// The link between two node groups of a statement.
#[derive(Debug, Clone, PartialEq)]
struct Link {
    stroke: EdgeStroke,
    arrow: bool,
    label: Option<String>,
}

/// `group (link group)*`, where a group is `node (& node)*`.
#[derive(Debug)]
struct Statement {
    groups: Vec<Vec<NodeRef>>,
    links: Vec<Link>,
}

impl Statement {
    fn apply(self, graph: &mut Graph) {
        let Statement { groups, links } = self;

        for node in groups.iter().flatten() {
            match &node.declared {
                Some((shape, label)) => graph.declare_node(&node.id, label, *shape),
                None => graph.ensure_node(&node.id),
            }
        }

        for (i, link) in links.iter().enumerate() {
            for from in &groups[i] {
                for to in &groups[i + 1] {
                    graph.add_edge(FlowchartEdge {
                        from: from.id.clone(),
                        to: to.id.clone(),
                        label: link.label.clone(),
                        stroke: link.stroke,
                        arrow: link.arrow,
                    });
                }
            }
        }
    }
}

fn parse_statement(text: &str) -> Option<Statement> {
    let mut cursor = Cursor::new(text);
    let mut groups = vec![cursor.node_group()?];
    let mut links = Vec::new();

    loop {
        cursor.skip_ws();
        if cursor.is_done() {
            break;
        }
        links.push(cursor.link()?);
        cursor.skip_ws();
        groups.push(cursor.node_group()?);
    }

    // A bare id is neither a declaration nor an edge.
    let declares_something = !links.is_empty() || groups[0].iter().any(|n| n.declared.is_some());
    declares_something.then_some(Statement { groups, links })
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn is_done(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn node_group(&mut self) -> Option<Vec<NodeRef>> {
        let mut group = vec![self.node_ref()?];
        loop {
            let save = self.pos;
            self.skip_ws();
            if self.rest().starts_with('&') {
                self.pos += 1;
                self.skip_ws();
                group.push(self.node_ref()?);
            } else {
                self.pos = save;
                return Some(group);
            }
        }
    }

    fn node_ref(&mut self) -> Option<NodeRef> {
        let rest = self.rest();
        let id_len = rest
            .char_indices()
            .find(|&(_, c)| !is_id_char(c))
            .map_or(rest.len(), |(i, _)| i);
        if id_len == 0 {
            return None;
        }
        let id = rest[..id_len].to_string();
        self.pos += id_len;

        let declared = self.declaration()?;
        self.class_suffix();

        Some(NodeRef { id, declared })
    }

    /// Bracketed label right after an id. `None` means malformed,
    /// `Some(None)` means there is no bracket at all.
    fn declaration(&mut self) -> Option<Option<(ShapeKind, String)>> {
        let rest = self.rest();
        for shape in ShapeKind::PRIORITY {
            let (open, close) = shape.brackets();
            if !rest.starts_with(open) {
                continue;
            }
            let end = find_closing(rest, open, close)?;
            let label = clean_label(unwrap_double_brackets(&rest[1..end]));
            self.pos += end + close.len_utf8();
            return Some(Some((shape, label)));
        }
        Some(None)
    }

    fn class_suffix(&mut self) {
        if let Some(after) = self.rest().strip_prefix(":::") {
            let len = after
                .char_indices()
                .find(|&(_, c)| !(is_id_char(c) || c == '-'))
                .map_or(after.len(), |(i, _)| i);
            self.pos += 3 + len;
        }
    }

    fn link(&mut self) -> Option<Link> {
        let rest = self.rest();
        let (mut link, consumed) = plain_link(rest).or_else(|| labelled_link(rest))?;
        self.pos += consumed;

        let save = self.pos;
        self.skip_ws();
        if let Some(after) = self.rest().strip_prefix('|') {
            let end = after.find('|')?;
            let label = clean_label(&after[..end]);
            link.label = (!label.is_empty()).then_some(label);
            self.pos += end + 2;
        } else {
            self.pos = save;
        }

        Some(link)
    }
}

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Index of the bracket closing the one at `text[0]`.
///
/// A `"` right after the opening bracket starts a quoted label whose brackets
/// do not count. Any other `"` is plain text, and a quoted label that never
/// closes is rescanned as plain text.
fn find_closing(text: &str, open: char, close: char) -> Option<usize> {
    let quoted = text[open.len_utf8()..].starts_with('"');
    scan_closing(text, open, close, quoted).or_else(|| {
        quoted
            .then(|| scan_closing(text, open, close, false))
            .flatten()
    })
}

fn scan_closing(text: &str, open: char, close: char, track_quotes: bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, c) in text.char_indices() {
        if track_quotes && c == '"' {
            in_quote = !in_quote;
        } else if in_quote {
            continue;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// `[[x]]`, `((x))`, `([x])`, `[(x)]`, `{{x}}` all carry the label `x`.
fn unwrap_double_brackets(label: &str) -> &str {
    let trimmed = label.trim();
    for (open, close) in [('[', ']'), ('(', ')'), ('{', '}')] {
        // `(a) or (b)` starts and ends with parens but is not wrapped
        if trimmed.starts_with(open)
            && find_closing(trimmed, open, close) == Some(trimmed.len() - close.len_utf8())
        {
            return &trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()];
        }
    }
    label
}

fn clean_label(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Unlabelled links: `-->`, `---`, `-.->`, `-.-`, `==>`, `===` and longer runs.
fn plain_link(rest: &str) -> Option<(Link, usize)> {
    let (stroke, arrow, consumed) = if let Some(dotted) = rest.strip_prefix("-.") {
        let (arrow, consumed) = closing_dotted(&format!(".{dotted}"))?;
        (EdgeStroke::Dotted, arrow, consumed + 1)
    } else if rest.starts_with('-') {
        let (arrow, consumed) = closing_run(rest, '-')?;
        (EdgeStroke::Solid, arrow, consumed)
    } else if rest.starts_with('=') {
        let (arrow, consumed) = closing_run(rest, '=')?;
        (EdgeStroke::Thick, arrow, consumed)
    } else {
        return None;
    };

    Some((
        Link {
            stroke,
            arrow,
            label: None,
        },
        consumed,
    ))
}

/// Labelled links: `-- text -->`, `-. text .->`, `== text ==>` (and open variants).
fn labelled_link(rest: &str) -> Option<(Link, usize)> {
    let forms: [(&str, EdgeStroke); 3] = [
        ("--", EdgeStroke::Solid),
        ("-.", EdgeStroke::Dotted),
        ("==", EdgeStroke::Thick),
    ];

    for (opener, stroke) in forms {
        let Some(body) = rest.strip_prefix(opener) else {
            continue;
        };

        let mut in_quote = false;
        for (i, c) in body.char_indices() {
            if c == '"' && (in_quote || body[..i].trim().is_empty()) {
                in_quote = !in_quote;
                continue;
            }
            if in_quote || i == 0 {
                continue;
            }
            let closing = match stroke {
                EdgeStroke::Solid if c == '-' => closing_run(&body[i..], '-'),
                EdgeStroke::Thick if c == '=' => closing_run(&body[i..], '='),
                EdgeStroke::Dotted if c == '.' => closing_dotted(&body[i..]),
                _ => None,
            };
            let Some((arrow, consumed)) = closing else {
                continue;
            };
            let label = clean_label(&body[..i]);
            if label.is_empty() {
                return None;
            }
            return Some((
                Link {
                    stroke,
                    arrow,
                    label: Some(label),
                },
                opener.len() + i + consumed,
            ));
        }
    }

    None
}

/// `c{2,}>` is an arrow, `c{3,}` an open link.
fn closing_run(text: &str, c: char) -> Option<(bool, usize)> {
    let run = text.chars().take_while(|&ch| ch == c).count();
    if run >= 2 && text[run..].starts_with('>') {
        Some((true, run + 1))
    } else if run >= 3 {
        Some((false, run))
    } else {
        None
    }
}

/// `.+->` is an arrow, `.+-` an open link.
fn closing_dotted(text: &str) -> Option<(bool, usize)> {
    let dots = text.chars().take_while(|&ch| ch == '.').count();
    if dots == 0 || !text[dots..].starts_with('-') {
        return None;
    }
    let arrow = text[dots + 1..].starts_with('>');
    Some((arrow, dots + 1 + usize::from(arrow)))
}
