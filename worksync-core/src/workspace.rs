//! The rendered workspace: base tree + generated overlay + selection.
//!
//! Whenever an input changes (a fresh disk snapshot, a different iteration,
//! the change-only toggle) the merged and visible trees are recomputed from
//! scratch and the selection index is rebuilt against the new visible tree.
//! Trees are never patched in place.

use std::collections::{BTreeSet, HashSet};

use crate::selection::SelectionPropagator;
use crate::tree::{self, changed_only, generated_tree, merge};
use crate::types::{relative_path, FileNode, Iteration};

#[derive(Debug)]
pub struct Workspace {
    base: FileNode,
    generated: Option<FileNode>,
    changed_only: bool,
    merged: FileNode,
    visible: FileNode,
    selection: SelectionPropagator,
    expanded: BTreeSet<String>,
    focused: Option<String>,
}

impl Workspace {
    pub fn new(base: FileNode) -> Self {
        let selection = SelectionPropagator::new(&base);
        Self {
            merged: base.clone(),
            visible: base.clone(),
            base,
            generated: None,
            changed_only: false,
            selection,
            expanded: BTreeSet::new(),
            focused: None,
        }
    }

    pub fn base(&self) -> &FileNode {
        &self.base
    }

    pub fn merged(&self) -> &FileNode {
        &self.merged
    }

    /// The tree handed to the widget: merged, or its change-only view.
    pub fn visible(&self) -> &FileNode {
        &self.visible
    }

    pub fn is_changed_only(&self) -> bool {
        self.changed_only
    }

    pub fn selection(&self) -> &SelectionPropagator {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionPropagator {
        &mut self.selection
    }

    /// Replace the disk snapshot (after a watcher event or rescan).
    pub fn set_base(&mut self, base: FileNode) {
        self.base = base;
        self.recompute();
    }

    /// Replace the generated overlay directly.
    pub fn set_generated(&mut self, generated: Option<FileNode>) {
        self.generated = generated;
        self.recompute();
    }

    /// Overlay an iteration's files, classifying them against the base tree.
    pub fn show_iteration(&mut self, iteration: Option<&Iteration>) {
        let generated = iteration.map(|it| {
            let on_disk = leaf_set(&self.base);
            generated_tree(&self.base.name, &it.files, |path| on_disk.contains(path))
        });
        self.set_generated(generated);
    }

    pub fn set_changed_only(&mut self, changed_only: bool) {
        if self.changed_only != changed_only {
            self.changed_only = changed_only;
            self.recompute();
        }
    }

    /// Widget `onCheck`: leaf paths to feed the context synchronizer.
    pub fn on_check<I, S>(&mut self, raw_checked_keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selection.on_check(raw_checked_keys)
    }

    /// Widget `onSelect`: focus a node. Returns the node when it exists in
    /// the visible tree.
    pub fn on_select(&mut self, key: &str) -> Option<&FileNode> {
        match tree::find(&self.visible, key) {
            Some(node) => {
                self.focused = Some(key.to_string());
                Some(node)
            }
            None => {
                tracing::debug!("select ignored for key absent from tree: {key}");
                self.focused = None;
                None
            }
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Widget `onExpand`.
    pub fn on_expand<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let current = tree::keys(&self.visible);
        self.expanded = keys
            .into_iter()
            .map(|k| k.as_ref().to_string())
            .filter(|k| current.contains(k))
            .collect();
    }

    pub fn expanded_keys(&self) -> Vec<String> {
        self.expanded.iter().cloned().collect()
    }

    /// Selected files as project-relative paths, sorted.
    pub fn selected_files(&self) -> Vec<String> {
        self.selection
            .selected()
            .iter()
            .map(|p| relative_path(p).to_string())
            .collect()
    }

    fn recompute(&mut self) {
        self.merged = match &self.generated {
            Some(generated) => merge(&self.base, generated),
            None => self.base.clone(),
        };
        self.visible = if self.changed_only {
            changed_only(&self.merged)
        } else {
            self.merged.clone()
        };

        self.selection.rebuild(&self.visible);
        let current = tree::keys(&self.visible);
        self.expanded.retain(|k| current.contains(k));
        if let Some(focused) = &self.focused {
            if !current.contains(focused) {
                self.focused = None;
            }
        }
    }
}

fn leaf_set(tree: &FileNode) -> HashSet<String> {
    tree::leaves(tree).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::types::{ChangeType, GeneratedFile, IterationId};

    fn base() -> FileNode {
        FileNode::dir(
            "proj",
            "/",
            vec![FileNode::dir(
                "src",
                "/src",
                vec![
                    FileNode::file("a.ts", "/src/a.ts"),
                    FileNode::file("b.ts", "/src/b.ts"),
                ],
            )],
        )
    }

    fn iteration() -> Iteration {
        let mut files = BTreeMap::new();
        files.insert(
            "src/a.ts".to_string(),
            GeneratedFile {
                content: "changed".to_string(),
                deleted: false,
            },
        );
        files.insert(
            "src/c.ts".to_string(),
            GeneratedFile {
                content: "new".to_string(),
                deleted: false,
            },
        );
        Iteration {
            id: IterationId::from("I0"),
            prompt: "p".to_string(),
            files,
            personalities: vec![],
            provider: None,
            start_from_iteration_id: None,
        }
    }

    #[test]
    fn iteration_overlay_is_classified_against_base() {
        let mut ws = Workspace::new(base());
        ws.show_iteration(Some(&iteration()));

        let a = tree::find(ws.merged(), "/src/a.ts").expect("a");
        let c = tree::find(ws.merged(), "/src/c.ts").expect("c");
        assert_eq!(a.change_type, Some(ChangeType::Modified));
        assert_eq!(c.change_type, Some(ChangeType::Added));
        assert!(tree::find(ws.merged(), "/src/b.ts").is_some());
    }

    #[test]
    fn changed_only_toggle_rebuilds_selection_index() {
        let mut ws = Workspace::new(base());
        ws.show_iteration(Some(&iteration()));

        assert_eq!(
            ws.on_check(["/src"]),
            vec!["/src/a.ts", "/src/b.ts", "/src/c.ts"]
        );

        ws.set_changed_only(true);
        // b.ts is hidden and therefore pruned from the retained selection.
        assert_eq!(ws.selection().selected(), vec!["/src/a.ts", "/src/c.ts"]);
        assert_eq!(ws.on_check(["/src"]), vec!["/src/a.ts", "/src/c.ts"]);
        assert_eq!(ws.selected_files(), vec!["src/a.ts", "src/c.ts"]);
    }

    #[test]
    fn clearing_iteration_drops_generated_only_selection() {
        let mut ws = Workspace::new(base());
        ws.show_iteration(Some(&iteration()));
        ws.on_check(["/src/c.ts", "/src/a.ts"]);

        ws.show_iteration(None);
        assert_eq!(ws.selection().selected(), vec!["/src/a.ts"]);
    }

    #[test]
    fn select_and_expand_track_current_tree() {
        let mut ws = Workspace::new(base());
        ws.show_iteration(Some(&iteration()));
        ws.on_expand(["/src", "/gone"]);
        assert_eq!(ws.expanded_keys(), vec!["/src"]);

        assert!(ws.on_select("/src/c.ts").is_some());
        assert_eq!(ws.focused(), Some("/src/c.ts"));

        ws.show_iteration(None);
        assert_eq!(ws.focused(), None);
        assert!(ws.on_select("/src/c.ts").is_none());
    }
}
