//! Squarified treemap layout of the cluster hierarchy
//!
//! Each cluster gets a [`TreemapNode`] shadow holding its rectangle and
//! weight. Rectangles are assigned top-down: a parent's rectangle is shrunk
//! by the nesting margin and then partitioned among its children, heaviest
//! first, into strips chosen to keep the children close to square.

use rand::Rng;
use tracing::{debug, warn};

use crate::cluster::{ClusterHierarchy, ClusterId};
use crate::math::Vec2;
use crate::traversal;

/// Upper bound (exclusive in spirit) of the nesting margin factor
pub const MAX_NESTING: f32 = 0.4999;

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Rectangle spanning `-extent..extent` on both axes
    pub fn centered(extent: Vec2) -> Self {
        Self::new([-extent[0], -extent[1]], extent)
    }

    pub fn width(&self) -> f32 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f32 {
        self.max[1] - self.min[1]
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Vec2 {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ]
    }

    /// Half size
    pub fn extent(&self) -> Vec2 {
        [self.width() * 0.5, self.height() * 0.5]
    }

    /// Move every side inward by `amount`
    pub fn shrink(&self, amount: f32) -> Self {
        Self::new(
            [self.min[0] + amount, self.min[1] + amount],
            [self.max[0] - amount, self.max[1] - amount],
        )
    }

    /// Sub-rectangle between two fractions of one axis
    fn slab(&self, orientation: Orientation, from: f64, to: f64) -> Self {
        match orientation {
            Orientation::Horizontal => {
                let w = self.width() as f64;
                Self::new(
                    [self.min[0] + (w * from) as f32, self.min[1]],
                    [self.min[0] + (w * to) as f32, self.max[1]],
                )
            }
            Orientation::Vertical => {
                let h = self.height() as f64;
                Self::new(
                    [self.min[0], self.min[1] + (h * from) as f32],
                    [self.max[0], self.min[1] + (h * to) as f32],
                )
            }
        }
    }
}

/// Direction in which slice-and-dice lays out its strips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Strips side by side along x
    Horizontal,
    /// Strips stacked along y
    Vertical,
}

impl Orientation {
    /// Split along the longer side of `bounds`
    pub fn along_longer_side(bounds: &Rect) -> Self {
        if bounds.width() > bounds.height() {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }
}

/// Source of leaf weights
#[derive(Debug, Clone, PartialEq)]
pub enum LeafWeights {
    /// Uniform samples in `[1, 2)`
    Random,
    /// Weight per cluster index; internal entries are ignored
    PerCluster(Vec<f64>),
}

#[derive(Debug, Clone)]
pub struct TreemapNode {
    pub cluster: ClusterId,
    pub children: Vec<usize>,
    pub rect: Rect,
    pub weight: f64,
}

impl TreemapNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Treemap nodes mirroring the cluster arena index for index
#[derive(Debug, Clone)]
pub struct TreemapLayout {
    nodes: Vec<TreemapNode>,
    root: usize,
}

impl TreemapLayout {
    pub fn new(hierarchy: &ClusterHierarchy) -> Self {
        let nodes = hierarchy
            .clusters()
            .iter()
            .map(|cluster| TreemapNode {
                cluster: cluster.index,
                children: cluster.children.clone(),
                rect: Rect::default(),
                weight: 0.0,
            })
            .collect();
        Self {
            nodes,
            root: hierarchy.root(),
        }
    }

    pub fn nodes(&self) -> &[TreemapNode] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &TreemapNode {
        &self.nodes[id]
    }

    pub fn root(&self) -> usize {
        self.root
    }

    /// Set leaf weights, then give every internal node the sum of its
    /// children.
    pub fn assign_weights<R: Rng>(&mut self, weights: &LeafWeights, rng: &mut R) {
        let nodes = &self.nodes;
        let order = traversal::post_order(self.root, move |id| nodes[id].children.as_slice());
        let mut rejected = 0usize;

        for id in order {
            let weight = if self.nodes[id].is_leaf() {
                match weights {
                    LeafWeights::Random => rng.gen_range(1.0..2.0),
                    LeafWeights::PerCluster(values) => {
                        let value = values.get(id).copied().unwrap_or(1.0);
                        if value.is_finite() && value >= 0.0 {
                            value
                        } else {
                            rejected += 1;
                            0.0
                        }
                    }
                }
            } else {
                self.nodes[id]
                    .children
                    .iter()
                    .map(|&child| self.nodes[child].weight)
                    .sum()
            };
            self.nodes[id].weight = weight;
        }

        if rejected > 0 {
            warn!(rejected, "Replaced negative or non-finite leaf weights with 0");
        }
    }

    /// Partition `bounds` into strips proportional to the children's weights.
    ///
    /// Without an explicit orientation the strips run along the longer side.
    /// The last strip ends exactly on the bounds edge. Children whose total
    /// weight is zero share the bounds evenly.
    pub fn slice_and_dice(
        &mut self,
        children: &[usize],
        bounds: Rect,
        orientation: Option<Orientation>,
    ) {
        if children.is_empty() {
            return;
        }
        let orientation = orientation.unwrap_or_else(|| Orientation::along_longer_side(&bounds));
        let total = self.total_weight(children);
        let even = !(total > 0.0 && total.is_finite());
        let last = children.len() - 1;

        let mut offset = 0.0f64;
        for (i, &child) in children.iter().enumerate() {
            let share = if even {
                1.0 / children.len() as f64
            } else {
                self.nodes[child].weight / total
            };
            let end = if i == last { 1.0 } else { offset + share };
            self.nodes[child].rect = bounds.slab(orientation, offset, end);
            offset = end;
        }
    }

    /// Squarified partition of `bounds` among `children`, which must already
    /// be sorted heaviest first.
    ///
    /// A run of children grows from the front while its worst aspect ratio
    /// does not get worse; the run fills a strip across the shorter side and
    /// the rest continue in the leftover rectangle. Two or fewer children
    /// fall back to slice-and-dice.
    pub fn squarified(&mut self, children: &[usize], bounds: Rect) {
        let mut remaining = children;
        let mut bounds = bounds;

        while remaining.len() > 2 {
            let total = self.total_weight(remaining);
            if !(total > 0.0 && total.is_finite()) {
                break;
            }

            let (w, h) = (bounds.width(), bounds.height());
            let (long, short, strip_axis) = if w < h {
                (h, w, Orientation::Vertical)
            } else {
                (w, h, Orientation::Horizontal)
            };

            let first = self.nodes[remaining[0]].weight / total;
            let mut offset = first;
            let mut worst = normalized_aspect_ratio(long, short, first, offset);
            let mut run = 1;
            while run < remaining.len() {
                let relative = self.nodes[remaining[run]].weight / total;
                let grown = offset + relative;
                let candidate = normalized_aspect_ratio(long, short, first, grown)
                    .max(normalized_aspect_ratio(long, short, relative, grown));
                if candidate > worst {
                    break;
                }
                worst = candidate;
                offset = grown;
                run += 1;
            }

            if run == remaining.len() {
                break;
            }

            let strip = bounds.slab(strip_axis, 0.0, offset);
            let rest = bounds.slab(strip_axis, offset, 1.0);
            let rest = match strip_axis {
                Orientation::Horizontal => Rect::new(rest.min, [bounds.max[0], rest.max[1]]),
                Orientation::Vertical => Rect::new(rest.min, [rest.max[0], bounds.max[1]]),
            };
            self.slice_and_dice(&remaining[..run], strip, None);
            remaining = &remaining[run..];
            bounds = rest;
        }

        self.slice_and_dice(remaining, bounds, None);
    }

    /// Lay out the whole tree inside `root_rect` and return a 2D position
    /// per cluster.
    ///
    /// Weights must be assigned first. Each internal rectangle is shrunk by
    /// `min(w, h) * nesting / 2` per side before its children are placed;
    /// `nesting` is clamped to `[0, MAX_NESTING]`. Positions are rectangle
    /// centers with y flipped, jittered by half a random offset within the
    /// rectangle's extent.
    pub fn compute<R: Rng>(&mut self, root_rect: Rect, nesting: f32, rng: &mut R) -> Vec<Vec2> {
        let nesting = nesting.clamp(0.0, MAX_NESTING);
        self.nodes[self.root].rect = root_rect;

        let nodes = &self.nodes;
        let order = traversal::pre_order(self.root, move |id| nodes[id].children.as_slice());
        for id in order {
            if self.nodes[id].is_leaf() {
                continue;
            }
            self.sort_children_by_weight(id);
            let rect = self.nodes[id].rect;
            let margin = rect.width().min(rect.height()) * nesting * 0.5;
            let children = self.nodes[id].children.clone();
            self.squarified(&children, rect.shrink(margin));
        }

        debug!(
            nodes = self.nodes.len(),
            nesting, "Computed treemap rectangles"
        );

        self.nodes
            .iter()
            .map(|node| {
                let center = node.rect.center();
                let extent = node.rect.extent();
                [
                    center[0] + 0.5 * jitter(rng, extent[0]),
                    -center[1] + 0.5 * jitter(rng, extent[1]),
                ]
            })
            .collect()
    }

    /// Stable sort, heaviest first
    pub fn sort_children_by_weight(&mut self, id: usize) {
        let mut children = std::mem::take(&mut self.nodes[id].children);
        children.sort_by(|&a, &b| self.nodes[b].weight.total_cmp(&self.nodes[a].weight));
        self.nodes[id].children = children;
    }

    fn total_weight(&self, children: &[usize]) -> f64 {
        children.iter().map(|&child| self.nodes[child].weight).sum()
    }
}

/// Aspect ratio of a child with relative weight `relative` inside a strip
/// holding `offset` of the remaining weight, folded to be >= 1.
fn normalized_aspect_ratio(long: f32, short: f32, relative: f64, offset: f64) -> f64 {
    let ratio = (long as f64 / (short as f64 * relative)) * offset * offset;
    if ratio < 1.0 { 1.0 / ratio } else { ratio }
}

/// Uniform sample in `-extent..extent`, or 0 for an empty range
fn jitter<R: Rng>(rng: &mut R, extent: f32) -> f32 {
    if extent > 0.0 {
        rng.gen_range(-extent..extent)
    } else {
        0.0
    }
}
