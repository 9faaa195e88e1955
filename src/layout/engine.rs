//! Fixed-column layered layout.
//!
//! Columns, left to right: entry points, pools, servers (grouped under
//! their pool), user domains. Listen sections go in a region below the
//! tallest column with their servers one column to the right.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::layout::graph::{Edge, EdgeKind, Graph, Node, NodeKind};

/// Geometry of the layout. The defaults match the diagram the admin UI draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub padding: f64,
    pub node_width: f64,
    pub node_height: f64,
    /// Horizontal distance between column origins.
    pub column_gap: f64,
    /// Vertical gap between entry, pool and listen rows.
    pub row_gap: f64,
    /// Vertical gap between servers and user domains.
    pub server_gap: f64,
    /// Extra gap after each server group.
    pub group_gap: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            padding: 80.0,
            node_width: 180.0,
            node_height: 60.0,
            column_gap: 200.0,
            row_gap: 40.0,
            server_gap: 20.0,
            group_gap: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Stroke class of an edge, fixed by its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStyle {
    Solid,
    Dashed,
    Dotted,
    Thin,
}

impl From<EdgeKind> for EdgeStyle {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Default => EdgeStyle::Solid,
            EdgeKind::Conditional => EdgeStyle::Dashed,
            EdgeKind::Attachment => EdgeStyle::Dotted,
            EdgeKind::Member => EdgeStyle::Thin,
        }
    }
}

/// One cubic Bézier segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub start: Point,
    pub control1: Point,
    pub control2: Point,
    pub end: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedNode {
    #[serde(flatten)]
    pub node: Node,
    /// Top-left corner.
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedEdge {
    #[serde(flatten)]
    pub edge: Edge,
    pub style: EdgeStyle,
    pub curve: Curve,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_at: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub node_width: f64,
    pub node_height: f64,
    /// Bounding size including padding on the right and bottom.
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<PlacedNode>,
    pub edges: Vec<RoutedEdge>,
}

impl Layout {
    pub fn position(&self, id: &str) -> Option<Point> {
        self.nodes
            .iter()
            .find(|n| n.node.id == id)
            .map(|n| Point::new(n.x, n.y))
    }
}

/// Compute positions for every node and a curve for every edge whose ends
/// are both placed. Pure: same graph, same layout.
pub fn layout(graph: &Graph, opts: &LayoutOptions) -> Layout {
    let positions = place(graph, opts);

    let nodes: Vec<PlacedNode> = graph
        .nodes
        .iter()
        .filter_map(|node| {
            positions.get(node.id.as_str()).map(|p| PlacedNode {
                node: node.clone(),
                x: p.x,
                y: p.y,
            })
        })
        .collect();

    let edges = graph
        .edges
        .iter()
        .filter_map(|edge| route_edge(edge, &positions, opts))
        .collect();

    let width = nodes
        .iter()
        .map(|n| n.x + opts.node_width + opts.padding)
        .fold(0.0, f64::max);
    let height = nodes
        .iter()
        .map(|n| n.y + opts.node_height + opts.padding)
        .fold(0.0, f64::max);

    tracing::debug!(
        nodes = nodes.len(),
        edges = graph.edges.len(),
        width,
        height,
        "Layout computed"
    );

    Layout {
        node_width: opts.node_width,
        node_height: opts.node_height,
        width,
        height,
        nodes,
        edges,
    }
}

/// Server ids owned by `owner` through member edges, in node order.
fn members<'a>(graph: &'a Graph, owner: &str) -> Vec<&'a str> {
    let owned: HashSet<&str> = graph
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Member && e.from == owner)
        .map(|e| e.to.as_str())
        .collect();
    graph
        .nodes_of(NodeKind::Server)
        .filter(|n| owned.contains(n.id.as_str()))
        .map(|n| n.id.as_str())
        .collect()
}

fn place<'a>(graph: &'a Graph, opts: &LayoutOptions) -> HashMap<&'a str, Point> {
    let mut positions: HashMap<&str, Point> = HashMap::new();
    let h = opts.node_height;
    let pad = opts.padding;
    let column = |n: f64| pad + opts.column_gap * n;
    let row_step = h + opts.row_gap;
    let server_step = h + opts.server_gap;

    let entries: Vec<&Node> = graph.nodes_of(NodeKind::Entry).collect();
    let pools: Vec<&Node> = graph.nodes_of(NodeKind::Pool).collect();

    for (i, node) in entries.iter().enumerate() {
        positions.insert(&node.id, Point::new(column(0.0), pad + i as f64 * row_step));
    }
    for (i, node) in pools.iter().enumerate() {
        positions.insert(&node.id, Point::new(column(1.0), pad + i as f64 * row_step));
    }

    let mut server_y = pad;
    for pool in &pools {
        let servers: Vec<&str> = members(graph, &pool.id)
            .into_iter()
            .filter(|id| !positions.contains_key(id))
            .collect();
        for id in &servers {
            positions.insert(id, Point::new(column(2.0), server_y));
            server_y += server_step;
        }
        if !servers.is_empty() {
            server_y += opts.group_gap;
        }
    }

    let listens: Vec<&Node> = graph.nodes_of(NodeKind::Listen).collect();
    let listen_owned: HashSet<&str> = listens
        .iter()
        .flat_map(|l| members(graph, &l.id))
        .collect();

    // Servers with no owner close the server column.
    for node in graph.nodes_of(NodeKind::Server) {
        if !positions.contains_key(node.id.as_str()) && !listen_owned.contains(node.id.as_str()) {
            positions.insert(&node.id, Point::new(column(2.0), server_y));
            server_y += server_step;
        }
    }

    let mut user_y = pad;
    for node in graph.nodes_of(NodeKind::UserDomain) {
        positions.insert(&node.id, Point::new(column(3.0), user_y));
        user_y += server_step;
    }

    let tallest = [
        entries.len() as f64 * row_step,
        pools.len() as f64 * row_step,
        server_y,
        user_y,
    ]
    .into_iter()
    .fold(0.0, f64::max);

    let mut block_y = tallest + pad;
    for listen in &listens {
        positions.insert(&listen.id, Point::new(column(0.0), block_y));
        let servers: Vec<&str> = members(graph, &listen.id)
            .into_iter()
            .filter(|id| !positions.contains_key(id))
            .collect();
        for (j, id) in servers.iter().enumerate() {
            positions.insert(id, Point::new(column(1.0), block_y + j as f64 * server_step));
        }
        // A block is as tall as its server stack, so blocks never overlap.
        let stack = servers.len() as f64 * server_step + opts.server_gap;
        block_y += row_step.max(stack);
    }

    positions
}

fn route_edge(
    edge: &Edge,
    positions: &HashMap<&str, Point>,
    opts: &LayoutOptions,
) -> Option<RoutedEdge> {
    let from = positions.get(edge.from.as_str())?;
    let to = positions.get(edge.to.as_str())?;

    let start = Point::new(from.x + opts.node_width, from.y + opts.node_height / 2.0);
    let end = Point::new(to.x, to.y + opts.node_height / 2.0);
    let mid_x = (start.x + end.x) / 2.0;

    let label_at = edge
        .label
        .as_ref()
        .map(|_| Point::new(mid_x, (start.y + end.y) / 2.0 - 10.0));

    Some(RoutedEdge {
        edge: edge.clone(),
        style: edge.kind.into(),
        curve: Curve {
            start,
            control1: Point::new(mid_x, start.y),
            control2: Point::new(mid_x, end.y),
            end,
        },
        label_at,
    })
}
