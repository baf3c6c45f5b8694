//! graphdome - Immersive graph layout on a sphere.
//!
//! Nodes are grouped by a cluster hierarchy, laid out with a squarified
//! treemap and projected onto the unit sphere. Edges are bundled through
//! the hierarchy and drawn as B-spline tubes whose geometry is produced in
//! per-visibility-group batches.

pub mod bundling;
pub mod cluster;
pub mod color;
pub mod config;
pub mod graph;
pub mod highlight;
pub mod io;
pub mod math;
pub mod mesh;
pub mod projection;
pub mod scene;
pub mod traversal;
pub mod treemap;

#[cfg(feature = "gpu")]
pub mod gpu;

#[cfg(test)]
mod test_graphs;
