//! Graph layout engine.
//!
//! # Responsibilities
//! - Build a node/edge graph from compiled plans or the raw gateway file
//! - Position every node in a fixed four-column layered layout
//! - Route each edge as one cubic curve between node sides
//!
//! # Design Decisions
//! - Pure computation: coordinates only, no drawing and no pan/zoom state
//! - Deterministic: same graph in, same layout out; the input is never mutated
//! - Edge style comes from the edge kind alone
//!
//! # Data Flow
//! ```text
//! EmissionPlan[] ──▶ Graph::from_plans ──┐
//!                                        ├──▶ layout() ──▶ Layout
//! GatewayConfig ──▶ Graph::from_gateway ─┘
//! ```

pub mod engine;
pub mod graph;

pub use engine::{layout, Curve, EdgeStyle, Layout, LayoutOptions, PlacedNode, Point, RoutedEdge};
pub use graph::{Edge, EdgeKind, Graph, Node, NodeKind, UserDomain};
