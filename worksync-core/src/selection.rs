//! Tri-state checkbox keys to leaf (file) path selection.
//!
//! The tree widget reports raw checked keys, which may name directories and
//! may outlive the tree they were computed against. Everything downstream
//! consumes only leaf paths, so each emission:
//!
//! 1. drops keys absent from the current tree (stale after a recompute),
//! 2. expands directory keys into their current leaf descendants,
//! 3. deduplicates and sorts.
//!
//! The key-to-leaves index is rebuilt from whatever tree is currently
//! rendered, so the same directory expands differently in the full and the
//! change-only view.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::types::FileNode;

type SelectionListener = Box<dyn FnMut(&[String]) + Send>;

/// Converts checkbox interaction into a leaf-path selection.
pub struct SelectionPropagator {
    /// Node path -> leaf paths under it. A leaf maps to itself.
    index: HashMap<String, Vec<String>>,
    selected: BTreeSet<String>,
    listener: Option<SelectionListener>,
}

impl fmt::Debug for SelectionPropagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionPropagator")
            .field("keys", &self.index.len())
            .field("selected", &self.selected)
            .finish()
    }
}

impl SelectionPropagator {
    pub fn new(tree: &FileNode) -> Self {
        let mut index = HashMap::new();
        index_node(tree, &mut index);
        Self {
            index,
            selected: BTreeSet::new(),
            listener: None,
        }
    }

    /// Register the `on_file_selection_change` callback.
    pub fn on_file_selection_change(&mut self, listener: impl FnMut(&[String]) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Re-index against a recomputed tree and prune the retained selection.
    ///
    /// Returns how many previously selected paths were dropped.
    pub fn rebuild(&mut self, tree: &FileNode) -> usize {
        self.index.clear();
        index_node(tree, &mut self.index);

        let before = self.selected.len();
        let index = &self.index;
        self.selected.retain(|path| is_leaf_key(index, path));
        let dropped = before - self.selected.len();
        if dropped > 0 {
            tracing::debug!("pruned {dropped} selected path(s) absent from recomputed tree");
        }
        dropped
    }

    /// Handle a raw checked-key set from the tree widget.
    ///
    /// Returns the emitted leaf paths (sorted, deduplicated) and forwards them
    /// to the registered listener.
    pub fn on_check<I, S>(&mut self, raw_checked_keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut expanded = BTreeSet::new();
        let mut stale = 0usize;
        for key in raw_checked_keys {
            match self.index.get(key.as_ref()) {
                Some(leaves) => expanded.extend(leaves.iter().cloned()),
                None => stale += 1,
            }
        }
        if stale > 0 {
            tracing::debug!("ignored {stale} checked key(s) absent from the current tree");
        }

        self.selected = expanded;
        let emitted = self.selected();
        if let Some(listener) = self.listener.as_mut() {
            listener(&emitted);
        }
        emitted
    }

    /// Seed the selection without emitting (e.g. from a fetched context record).
    ///
    /// Paths not present as leaves in the current tree are ignored.
    pub fn set_selected<I, S>(&mut self, leaf_paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let index = &self.index;
        self.selected = leaf_paths
            .into_iter()
            .filter(|p| is_leaf_key(index, p.as_ref()))
            .map(|p| p.as_ref().to_string())
            .collect();
    }

    /// Currently selected leaf paths, sorted.
    pub fn selected(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Fully checked keys for rendering: selected leaves plus every directory
    /// whose leaves are all selected.
    pub fn checked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .index
            .iter()
            .filter(|(_, leaves)| {
                !leaves.is_empty() && leaves.iter().all(|l| self.selected.contains(l))
            })
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Directories with some but not all leaves selected.
    pub fn half_checked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .index
            .iter()
            .filter(|(key, leaves)| {
                let hits = leaves.iter().filter(|l| self.selected.contains(*l)).count();
                hits > 0 && hits < leaves.len() && !is_leaf_key(&self.index, key)
            })
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

fn index_node(node: &FileNode, index: &mut HashMap<String, Vec<String>>) -> Vec<String> {
    let leaves = match &node.children {
        None => vec![node.path.clone()],
        Some(children) => children
            .iter()
            .flat_map(|child| index_node(child, index))
            .collect(),
    };
    index.insert(node.path.clone(), leaves.clone());
    leaves
}

fn is_leaf_key(index: &HashMap<String, Vec<String>>, key: &str) -> bool {
    index
        .get(key)
        .is_some_and(|leaves| leaves.len() == 1 && leaves[0] == key)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
