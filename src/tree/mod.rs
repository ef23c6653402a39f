//! Phylogenetic tree model
//!
//! Trees are stored as an arena of [`Clade`]s addressed by [`CladeId`].
//! Parsing lives in the format submodules; this module holds the
//! structural operations the report needs: traversal, ladderizing and
//! rerooting on an outgroup.

pub mod newick;
pub mod nexus;

use std::cmp::Reverse;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

/// Index of a clade in its tree's arena
pub type CladeId = usize;

/// Errors that can occur when reading or transforming a tree
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Failed to read tree file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Syntax error at byte {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Tree format '{0}' is not supported (supported: newick, nexus)")]
    UnsupportedFormat(String),

    #[error("Unknown tree format '{0}'")]
    UnknownFormat(String),

    #[error("No tree found in input")]
    Empty,

    #[error("Outgroup '{0}' not found in tree")]
    OutgroupNotFound(String),
}

/// A node in the tree (leaf or internal)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Clade {
    pub name: Option<String>,
    pub branch_length: Option<f64>,
    /// Numeric internal label, usually bootstrap support
    pub confidence: Option<f64>,
    pub children: Vec<CladeId>,
}

impl Clade {
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }
}

/// Input formats accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeFormat {
    #[default]
    Newick,
    Nexus,
    PhyloXml,
    NeXml,
    Cdao,
}

impl FromStr for TreeFormat {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newick" | "nwk" | "tree" => Ok(TreeFormat::Newick),
            "nexus" | "nex" => Ok(TreeFormat::Nexus),
            "phyloxml" => Ok(TreeFormat::PhyloXml),
            "nexml" => Ok(TreeFormat::NeXml),
            "cdao" => Ok(TreeFormat::Cdao),
            other => Err(TreeError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for TreeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeFormat::Newick => write!(f, "newick"),
            TreeFormat::Nexus => write!(f, "nexus"),
            TreeFormat::PhyloXml => write!(f, "phyloxml"),
            TreeFormat::NeXml => write!(f, "nexml"),
            TreeFormat::Cdao => write!(f, "cdao"),
        }
    }
}

/// A rooted tree
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    clades: Vec<Clade>,
    root: CladeId,
}

impl Tree {
    /// Build a tree from an arena and its root.
    ///
    /// Every child index must point into `clades`.
    pub fn from_parts(clades: Vec<Clade>, root: CladeId) -> Self {
        let mut tree = Self { clades, root };
        tree.compact();
        tree
    }

    pub fn root(&self) -> CladeId {
        self.root
    }

    pub fn clade(&self, id: CladeId) -> &Clade {
        &self.clades[id]
    }

    pub fn clade_mut(&mut self, id: CladeId) -> &mut Clade {
        &mut self.clades[id]
    }

    /// Number of clades reachable from the root
    pub fn len(&self) -> usize {
        self.clades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clades.is_empty()
    }

    /// All clades in depth-first preorder, starting at the root
    pub fn preorder(&self) -> Vec<CladeId> {
        let mut order = Vec::with_capacity(self.clades.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.clades[id].children.iter().rev().copied());
        }
        order
    }

    /// Leaves from top to bottom
    pub fn terminals(&self) -> Vec<CladeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.clades[id].is_terminal())
            .collect()
    }

    /// Names of all leaves, unnamed leaves skipped
    pub fn terminal_names(&self) -> Vec<&str> {
        self.terminals()
            .into_iter()
            .filter_map(|id| self.clades[id].name.as_deref())
            .collect()
    }

    pub fn count_terminals(&self) -> usize {
        self.terminals().len()
    }

    /// First clade (in preorder) with the given name
    pub fn find(&self, name: &str) -> Option<CladeId> {
        self.preorder()
            .into_iter()
            .find(|&id| self.clades[id].name.as_deref() == Some(name))
    }

    /// Clades from the root down to `target`, both inclusive
    pub fn path_to(&self, target: CladeId) -> Option<Vec<CladeId>> {
        let mut parents = vec![None; self.clades.len()];
        let mut reachable = false;
        for id in self.preorder() {
            reachable |= id == target;
            for &child in &self.clades[id].children {
                parents[child] = Some(id);
            }
        }
        if !reachable {
            return None;
        }

        let mut path = vec![target];
        let mut current = target;
        while let Some(parent) = parents[current] {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Terminal count below every clade, indexed by clade id
    fn terminal_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.clades.len()];
        for id in self.preorder().into_iter().rev() {
            let clade = &self.clades[id];
            counts[id] = if clade.is_terminal() {
                1
            } else {
                clade.children.iter().map(|&c| counts[c]).sum()
            };
        }
        counts
    }

    /// Sort children of every clade by their number of terminals.
    ///
    /// With `descending` the largest subtree comes first. The sort is
    /// stable, so equal subtrees keep their input order.
    pub fn ladderize(&mut self, descending: bool) {
        let counts = self.terminal_counts();
        for clade in &mut self.clades {
            if descending {
                clade.children.sort_by_key(|&c| Reverse(counts[c]));
            } else {
                clade.children.sort_by_key(|&c| counts[c]);
            }
        }
    }

    /// Reroot the tree on the clade named `outgroup`.
    ///
    /// A terminal outgroup gets a new bifurcating root with a zero-length
    /// branch to the outgroup; an internal outgroup becomes the new root
    /// itself. Branch lengths along the old root-to-outgroup path are
    /// shifted onto the reversed edges.
    pub fn root_with_outgroup(&mut self, outgroup: &str) -> Result<(), TreeError> {
        let target = self
            .find(outgroup)
            .ok_or_else(|| TreeError::OutgroupNotFound(outgroup.to_string()))?;
        let mut path = self
            .path_to(target)
            .ok_or_else(|| TreeError::OutgroupNotFound(outgroup.to_string()))?;

        if path.len() == 1 {
            // already the root
            return Ok(());
        }

        let old_root = path.remove(0);
        let root_child = path[0];
        let mut prev_blen = self.clades[target].branch_length.unwrap_or(0.0);
        let root_blen = self.clades[old_root].branch_length;

        let (new_root, mut new_parent) = if self.clades[target].is_terminal() {
            self.clades[target].branch_length = Some(0.0);
            let new_root = self.push(Clade {
                branch_length: root_blen,
                children: vec![target],
                ..Clade::default()
            });

            if path.len() == 1 {
                (new_root, new_root)
            } else {
                let parent = path.remove(path.len() - 2);
                self.detach(parent, target);
                let parent_blen = self.clades[parent].branch_length;
                self.clades[parent].branch_length = Some(prev_blen);
                prev_blen = parent_blen.unwrap_or(0.0);
                self.clades[new_root].children.insert(0, parent);
                (new_root, parent)
            }
        } else {
            self.clades[target].branch_length = root_blen;
            (target, target)
        };

        // Walk back up the remaining path, reversing each edge
        for &parent in path.iter().rev().skip(1) {
            self.detach(parent, new_parent);
            let parent_blen = self.clades[parent].branch_length;
            self.clades[parent].branch_length = Some(prev_blen);
            prev_blen = parent_blen.unwrap_or(0.0);
            self.clades[new_parent].children.insert(0, parent);
            new_parent = parent;
        }

        // The old root's child on the path now hangs below the new root
        self.detach(old_root, root_child);

        if self.clades[old_root].children.len() == 1 {
            let ingroup = self.clades[old_root].children[0];
            let blen = self.clades[ingroup].branch_length.unwrap_or(0.0) + prev_blen;
            self.clades[ingroup].branch_length = Some(blen);
            self.clades[new_parent].children.insert(0, ingroup);
        } else {
            self.clades[old_root].branch_length = Some(prev_blen);
            self.clades[new_parent].children.insert(0, old_root);
        }

        self.root = new_root;
        self.compact();
        Ok(())
    }

    fn push(&mut self, clade: Clade) -> CladeId {
        self.clades.push(clade);
        self.clades.len() - 1
    }

    fn detach(&mut self, parent: CladeId, child: CladeId) {
        self.clades[parent].children.retain(|&c| c != child);
    }

    /// Drop unreachable clades and renumber the arena in preorder.
    fn compact(&mut self) {
        let order = self.preorder();
        let mut remap = vec![usize::MAX; self.clades.len()];
        for (new_id, &old_id) in order.iter().enumerate() {
            remap[old_id] = new_id;
        }

        let mut clades: Vec<Clade> = order
            .iter()
            .map(|&old_id| std::mem::take(&mut self.clades[old_id]))
            .collect();
        for clade in &mut clades {
            for child in &mut clade.children {
                *child = remap[*child];
            }
        }

        self.clades = clades;
        self.root = 0;
    }
}

/// Parse a tree from text in the given format
pub fn parse_tree(input: &str, format: TreeFormat) -> Result<Tree, TreeError> {
    match format {
        TreeFormat::Newick => newick::parse(input),
        TreeFormat::Nexus => nexus::parse(input),
        other => Err(TreeError::UnsupportedFormat(other.to_string())),
    }
}

/// Read a tree file, optionally reroot it on an outgroup, and ladderize it
/// with the largest clades first.
pub fn read_tree(
    path: &Path,
    format: TreeFormat,
    outgroup: Option<&str>,
) -> Result<Tree, TreeError> {
    let content = fs::read_to_string(path)?;
    let mut tree = parse_tree(&content, format)?;
    if let Some(outgroup) = outgroup {
        tree.root_with_outgroup(outgroup)?;
    }
    tree.ladderize(true);
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tree: &Tree, ids: &[CladeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| tree.clade(id).name.clone().unwrap_or_else(|| "-".into()))
            .collect()
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("Newick".parse::<TreeFormat>().unwrap(), TreeFormat::Newick);
        assert_eq!("nexus".parse::<TreeFormat>().unwrap(), TreeFormat::Nexus);
        assert!("fasta".parse::<TreeFormat>().is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let err = parse_tree("<phyloxml/>", TreeFormat::PhyloXml).unwrap_err();
        assert!(matches!(err, TreeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_preorder_and_terminals() {
        let tree = newick::parse("(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;").unwrap();
        assert_eq!(names(&tree, &tree.preorder()), ["F", "A", "B", "E", "C", "D"]);
        assert_eq!(tree.terminal_names(), ["A", "B", "C", "D"]);
        assert_eq!(tree.count_terminals(), 4);
    }

    #[test]
    fn test_ladderize() {
        let mut tree = newick::parse("((C,D)E,A,B)F;").unwrap();
        tree.ladderize(false);
        assert_eq!(tree.terminal_names(), ["A", "B", "C", "D"]);

        tree.ladderize(true);
        assert_eq!(tree.terminal_names(), ["C", "D", "A", "B"]);
    }

    #[test]
    fn test_root_with_terminal_outgroup() {
        let mut tree = newick::parse("(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F").unwrap();
        tree.root_with_outgroup("A").unwrap();
        tree.ladderize(false);

        assert_eq!(tree.len(), 7);
        assert_eq!(names(&tree, &tree.preorder()), ["-", "A", "F", "B", "E", "C", "D"]);

        let a = tree.find("A").unwrap();
        let f = tree.find("F").unwrap();
        assert_eq!(tree.clade(a).branch_length, Some(0.0));
        assert_eq!(tree.clade(f).branch_length, Some(0.1));
    }

    #[test]
    fn test_root_with_nested_outgroup() {
        let mut tree = newick::parse("((A:1,B:2)X:3,C:4);").unwrap();
        tree.root_with_outgroup("A").unwrap();

        // new root -> (A:0, X) and X -> (old root's remaining child C, B)
        let root = tree.clade(tree.root());
        assert_eq!(root.children.len(), 2);
        let x = tree.find("X").unwrap();
        assert_eq!(tree.clade(x).branch_length, Some(1.0));
        let c = tree.find("C").unwrap();
        assert_eq!(tree.clade(c).branch_length, Some(7.0));
        assert_eq!(tree.count_terminals(), 3);
    }

    #[test]
    fn test_root_with_internal_outgroup() {
        let mut tree = newick::parse("((A:1,B:2)X:3,C:4,D:5)R;").unwrap();
        tree.root_with_outgroup("X").unwrap();
        assert_eq!(tree.clade(tree.root()).name.as_deref(), Some("X"));
        assert_eq!(tree.count_terminals(), 4);
        let r = tree.find("R").unwrap();
        assert_eq!(tree.clade(r).branch_length, Some(3.0));
    }

    #[test]
    fn test_path_to() {
        let tree = newick::parse("((A:1,B:2)X:3,C:4)R;").unwrap();
        let b = tree.find("B").unwrap();
        assert_eq!(names(&tree, &tree.path_to(b).unwrap()), ["R", "X", "B"]);
        assert_eq!(tree.path_to(tree.root()), Some(vec![tree.root()]));
    }

    #[test]
    fn test_reroot_deep_ladder() {
        let depth = 50_000;
        let mut text = "(".repeat(depth);
        text.push_str("L0:1");
        for i in 1..=depth {
            text.push_str(&format!(",L{}:1)", i));
        }

        let mut tree = newick::parse(&text).unwrap();
        tree.root_with_outgroup("L0").unwrap();
        tree.ladderize(true);

        assert_eq!(tree.count_terminals(), depth + 1);
        let l0 = tree.find("L0").unwrap();
        assert_eq!(tree.path_to(l0).unwrap().len(), 2);
        assert_eq!(tree.clade(l0).branch_length, Some(0.0));
    }

    #[test]
    fn test_missing_outgroup() {
        let mut tree = newick::parse("(A,B);").unwrap();
        let err = tree.root_with_outgroup("Z").unwrap_err();
        assert!(matches!(err, TreeError::OutgroupNotFound(name) if name == "Z"));
    }
}
