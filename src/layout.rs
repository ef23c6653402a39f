//! Cartesian layout of a tree for a rectangular phylogram
//!
//! X is the distance from the root, Y spreads the leaves evenly and
//! centres every internal clade between its outermost children.

use std::fmt::Write as _;

use serde::Serialize;

use crate::tree::{CladeId, Tree};

/// Vertical spacing between neighbouring leaves
pub const DEFAULT_LEAF_SPACING: f64 = 0.1;

/// Per-clade coordinates, indexed by [`CladeId`]
#[derive(Debug, Clone, PartialEq)]
pub struct TreeLayout {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl TreeLayout {
    pub fn compute(tree: &Tree, leaf_spacing: f64) -> Self {
        Self {
            x: x_coordinates(tree),
            y: y_coordinates(tree, leaf_spacing),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// One straight branch segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BranchLine {
    pub orientation: Orientation,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// Depth of every clade, summing branch lengths from the root.
///
/// Trees without any branch lengths fall back to unit lengths so the
/// plot does not collapse onto a single vertical line.
pub fn x_coordinates(tree: &Tree) -> Vec<f64> {
    let weighted = depths(tree, false);
    if weighted.iter().all(|&d| d == 0.0) {
        return depths(tree, true);
    }
    weighted
}

fn depths(tree: &Tree, unit_branch_lengths: bool) -> Vec<f64> {
    let mut depths = vec![0.0; tree.len()];
    let root = tree.root();
    depths[root] = tree.clade(root).branch_length.unwrap_or(0.0);

    for id in tree.preorder() {
        for &child in &tree.clade(id).children {
            let step = if unit_branch_lengths {
                1.0
            } else {
                tree.clade(child).branch_length.unwrap_or(0.0)
            };
            depths[child] = depths[id] + step;
        }
    }
    depths
}

/// Leaf `i` (top to bottom) sits at `(i + 1) * leaf_spacing`; internal
/// clades sit halfway between their first and last child.
pub fn y_coordinates(tree: &Tree, leaf_spacing: f64) -> Vec<f64> {
    let mut y = vec![0.0; tree.len()];
    for (i, leaf) in tree.terminals().into_iter().enumerate() {
        y[leaf] = (i + 1) as f64 * leaf_spacing;
    }

    for id in tree.preorder().into_iter().rev() {
        let children = &tree.clade(id).children;
        if let (Some(&first), Some(&last)) = (children.first(), children.last()) {
            y[id] = (y[first] + y[last]) / 2.0;
        }
    }
    y
}

/// Branch segments for the whole tree: a horizontal line from the parent's
/// depth to each clade, and a vertical line joining each clade's children.
pub fn branch_lines(tree: &Tree, layout: &TreeLayout) -> Vec<BranchLine> {
    let mut lines = Vec::with_capacity(tree.len() * 2);
    // (clade, depth of its parent)
    let mut stack: Vec<(CladeId, f64)> = vec![(tree.root(), 0.0)];

    while let Some((id, x_start)) = stack.pop() {
        let x_curr = layout.x[id];
        let y_curr = layout.y[id];

        lines.push(BranchLine {
            orientation: Orientation::Horizontal,
            x0: x_start,
            y0: y_curr,
            x1: x_curr,
            y1: y_curr,
        });

        let children = &tree.clade(id).children;
        if let (Some(&first), Some(&last)) = (children.first(), children.last()) {
            lines.push(BranchLine {
                orientation: Orientation::Vertical,
                x0: x_curr,
                y0: layout.y[last],
                x1: x_curr,
                y1: layout.y[first],
            });
            stack.extend(children.iter().rev().map(|&child| (child, x_curr)));
        }
    }
    lines
}

/// Join branch segments into a single SVG path string
pub fn svg_path(lines: &[BranchLine]) -> String {
    let mut path = String::with_capacity(lines.len() * 32);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            path.push(' ');
        }
        let _ = write!(path, "M {} {} L {} {}", line.x0, line.y0, line.x1, line.y1);
    }
    path
}
