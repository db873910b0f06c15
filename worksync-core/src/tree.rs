//! File tree merge, change-only pruning, and tree builders.
//!
//! ## Merge precedence
//!
//! [`merge`] is deliberately asymmetric: the generated (AI-produced) tree's
//! shape and attributes win wherever both trees know a path, and the base
//! (disk) tree only fills in structure the generated tree leaves
//! unspecified. `merge(a, b)` and `merge(b, a)` are therefore not expected
//! to agree.
//!
//! ## Identity
//!
//! Nodes are matched across trees by `path`, never by `name`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{io_err, CoreError};
use crate::types::{tree_path, ChangeType, FileNode, GeneratedFile};

/// Path of the root node in every tree.
pub const ROOT_PATH: &str = "/";

// ---------------------------------------------------------------------------
// 1. Merge
// ---------------------------------------------------------------------------

/// Combine a base (disk) tree with a generated overlay into one annotated tree.
///
/// - Paths present in both trees are merged recursively by path-union.
/// - Children unique to either side are kept; generated-only leaves without an
///   explicit tag are tagged [`ChangeType::Added`].
/// - A generated node that carries a change tag is a file and stays a leaf.
///   An untagged generated node without `children` takes `base`'s subtree.
pub fn merge(base: &FileNode, generated: &FileNode) -> FileNode {
    let children = match (&base.children, &generated.children) {
        (_, Some(generated_children)) => {
            Some(merge_children(base.children(), generated_children))
        }
        (Some(base_children), None) if generated.change_type.is_none() => {
            Some(base_children.clone())
        }
        _ => None,
    };

    FileNode {
        name: generated.name.clone(),
        path: generated.path.clone(),
        children,
        change_type: generated.change_type.or(base.change_type),
    }
}

fn merge_children(base: &[FileNode], generated: &[FileNode]) -> Vec<FileNode> {
    let generated_by_path: HashMap<&str, &FileNode> =
        generated.iter().map(|n| (n.path.as_str(), n)).collect();
    let base_paths: HashSet<&str> = base.iter().map(|n| n.path.as_str()).collect();

    let mut merged = Vec::with_capacity(base.len() + generated.len());
    for node in base {
        match generated_by_path.get(node.path.as_str()) {
            Some(overlay) => merged.push(merge(node, overlay)),
            None => merged.push(node.clone()),
        }
    }
    for node in generated {
        if !base_paths.contains(node.path.as_str()) {
            merged.push(mark_added(node));
        }
    }
    merged
}

/// Tag untagged leaves of a generated-only subtree as added.
fn mark_added(node: &FileNode) -> FileNode {
    match &node.children {
        Some(children) => FileNode {
            children: Some(children.iter().map(mark_added).collect()),
            ..shallow(node)
        },
        None => FileNode {
            change_type: Some(node.change_type.unwrap_or(ChangeType::Added)),
            ..node.clone()
        },
    }
}

// ---------------------------------------------------------------------------
// 2. Change-only pruning
// ---------------------------------------------------------------------------

/// Bottom-up prune keeping only leaves that carry a change tag.
///
/// A directory survives only if at least one descendant leaf survives. The
/// root (`is_root == true`) is always kept, possibly with empty children.
/// Deleted leaves carry a tag and therefore always survive.
pub fn filter_modified_only(tree: &FileNode, is_root: bool) -> Option<FileNode> {
    match &tree.children {
        None if is_root || tree.change_type.is_some() => Some(tree.clone()),
        None => None,
        Some(children) => {
            let kept: Vec<FileNode> = children
                .iter()
                .filter_map(|child| filter_modified_only(child, false))
                .collect();
            if kept.is_empty() && !is_root {
                return None;
            }
            Some(FileNode {
                children: Some(kept),
                ..shallow(tree)
            })
        }
    }
}

/// [`filter_modified_only`] applied at the root, which is never pruned.
pub fn changed_only(tree: &FileNode) -> FileNode {
    filter_modified_only(tree, true).unwrap_or_else(|| shallow(tree))
}

// ---------------------------------------------------------------------------
// 3. Builders
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of the directory at `root`.
///
/// Entries whose file name appears in `ignore` are skipped. Symlinks are
/// recorded as leaves and never followed. Children are sorted by name.
pub fn scan_tree(root: &Path, ignore: &[String]) -> Result<FileNode, CoreError> {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ROOT_PATH.to_string());
    let children = scan_dir(root, "", ignore)?;
    Ok(FileNode::dir(name, ROOT_PATH, children))
}

fn scan_dir(dir: &Path, prefix: &str, ignore: &[String]) -> Result<Vec<FileNode>, CoreError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(io_err(dir, err)),
    };

    let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if ignore.iter().any(|pattern| pattern == &name) {
            continue;
        }
        let path = format!("{prefix}/{name}");
        let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if file_type.is_dir() {
            let children = scan_dir(&entry.path(), &path, ignore)?;
            nodes.push(FileNode::dir(name, path, children));
        } else {
            nodes.push(FileNode::file(name, path));
        }
    }
    Ok(nodes)
}

/// Build a sparse tree from an iteration's file map.
///
/// Each leaf is tagged `deleted` when the entry says so, `modified` when
/// `exists(tree_path)` reports the file on disk, and `added` otherwise.
/// Intermediate directories are created as needed and left untagged.
pub fn generated_tree(
    root_name: &str,
    files: &BTreeMap<String, GeneratedFile>,
    exists: impl Fn(&str) -> bool,
) -> FileNode {
    let mut root = FileNode::dir(root_name, ROOT_PATH, vec![]);
    for (relative, file) in files {
        let path = tree_path(relative);
        let change = if file.deleted {
            ChangeType::Deleted
        } else if exists(&path) {
            ChangeType::Modified
        } else {
            ChangeType::Added
        };
        insert_leaf(&mut root, &path, change);
    }
    root
}

fn insert_leaf(root: &mut FileNode, path: &str, change: ChangeType) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((leaf_name, dirs)) = segments.split_last() else {
        return;
    };

    let mut cursor = root;
    let mut prefix = String::new();
    for segment in dirs {
        prefix.push('/');
        prefix.push_str(segment);
        let children = cursor.children.get_or_insert_with(Vec::new);
        let index = match children.iter().position(|c| c.path == prefix) {
            Some(index) => index,
            None => {
                children.push(FileNode::dir(*segment, prefix.clone(), vec![]));
                children.len() - 1
            }
        };
        cursor = &mut children[index];
        // A leaf sitting where a directory is needed becomes that directory.
        if cursor.children.is_none() {
            cursor.children = Some(Vec::new());
            cursor.change_type = None;
        }
    }

    let children = cursor.children.get_or_insert_with(Vec::new);
    let leaf = FileNode::file(*leaf_name, path).with_change(change);
    match children.iter_mut().find(|c| c.path == path) {
        Some(existing) => *existing = leaf,
        None => children.push(leaf),
    }
}

// ---------------------------------------------------------------------------
// 4. Queries
// ---------------------------------------------------------------------------

/// Paths of every leaf under `tree`, in tree order.
pub fn leaves(tree: &FileNode) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaves(tree, &mut out);
    out
}

fn collect_leaves(node: &FileNode, out: &mut Vec<String>) {
    match &node.children {
        None => out.push(node.path.clone()),
        Some(children) => children.iter().for_each(|c| collect_leaves(c, out)),
    }
}

/// Every node path in `tree`, root included.
pub fn keys(tree: &FileNode) -> HashSet<String> {
    let mut out = HashSet::new();
    let mut stack = vec![tree];
    while let Some(node) = stack.pop() {
        out.insert(node.path.clone());
        stack.extend(node.children());
    }
    out
}

/// Locate a node by path.
pub fn find<'a>(tree: &'a FileNode, path: &str) -> Option<&'a FileNode> {
    if tree.path == path {
        return Some(tree);
    }
    tree.children().iter().find_map(|child| find(child, path))
}

/// `(files, directories)` below `tree`, the root itself excluded.
pub fn count(tree: &FileNode) -> (usize, usize) {
    let mut files = 0usize;
    let mut dirs = 0usize;
    for child in tree.children() {
        if child.is_dir() {
            dirs += 1;
            let (f, d) = count(child);
            files += f;
            dirs += d;
        } else {
            files += 1;
        }
    }
    (files, dirs)
}

/// Rendering order: directories first, then files, each alphabetically.
pub fn sort_tree(tree: &FileNode) -> FileNode {
    match &tree.children {
        None => tree.clone(),
        Some(children) => {
            let mut sorted: Vec<FileNode> = children.iter().map(sort_tree).collect();
            sorted.sort_by(render_order);
            FileNode {
                children: Some(sorted),
                ..shallow(tree)
            }
        }
    }
}

fn render_order(a: &FileNode, b: &FileNode) -> Ordering {
    b.is_dir()
        .cmp(&a.is_dir())
        .then_with(|| a.name.cmp(&b.name))
}

/// Copy of `node` without its subtree (children left `None`).
fn shallow(node: &FileNode) -> FileNode {
    FileNode {
        name: node.name.clone(),
        path: node.path.clone(),
        children: None,
        change_type: node.change_type,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn base_tree() -> FileNode {
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

    fn generated() -> FileNode {
        FileNode::dir(
            "proj",
            "/",
            vec![FileNode::dir(
                "src",
                "/src",
                vec![
                    FileNode::file("a.ts", "/src/a.ts").with_change(ChangeType::Modified),
                    FileNode::file("c.ts", "/src/c.ts").with_change(ChangeType::Added),
                ],
            )],
        )
    }

    fn child<'a>(tree: &'a FileNode, path: &str) -> &'a FileNode {
        find(tree, path).unwrap_or_else(|| panic!("missing {path}"))
    }

    fn assert_prune_invariant(node: &FileNode, is_root: bool) {
        match &node.children {
            None => assert!(
                is_root || node.change_type.is_some(),
                "untagged leaf {} survived",
                node.path
            ),
            Some(children) => {
                if !is_root {
                    assert!(
                        !leaves(node).is_empty(),
                        "directory {} survived without leaves",
                        node.path
                    );
                }
                children.iter().for_each(|c| assert_prune_invariant(c, false));
            }
        }
    }

    #[test]
    fn scenario_a_merge_and_changed_only_view() {
        let merged = merge(&base_tree(), &generated());

        assert_eq!(
            child(&merged, "/src/a.ts").change_type,
            Some(ChangeType::Modified)
        );
        assert_eq!(child(&merged, "/src/b.ts").change_type, None);
        assert_eq!(
            child(&merged, "/src/c.ts").change_type,
            Some(ChangeType::Added)
        );

        let view = changed_only(&merged);
        let mut remaining = leaves(&view);
        remaining.sort();
        assert_eq!(remaining, vec!["/src/a.ts", "/src/c.ts"]);
        assert!(find(&view, "/src").is_some(), "src must be retained");
        assert!(find(&view, "/src/b.ts").is_none(), "b.ts must be pruned");
    }

    #[test]
    fn merge_is_idempotent_on_plain_tree() {
        let tree = base_tree();
        assert_eq!(merge(&tree, &tree), tree);
    }

    #[test]
    fn merge_is_idempotent_on_annotated_tree() {
        let tree = generated();
        assert_eq!(merge(&tree, &tree), tree);
    }

    #[test]
    fn generated_shape_wins_on_conflict() {
        // Disk has `/src/lib` as a directory; the generated tree writes a file there.
        let base = FileNode::dir(
            "proj",
            "/",
            vec![FileNode::dir(
                "lib",
                "/lib",
                vec![FileNode::file("x.ts", "/lib/x.ts")],
            )],
        );
        let overlay = FileNode::dir(
            "proj",
            "/",
            vec![FileNode::file("lib", "/lib").with_change(ChangeType::Added)],
        );

        let forward = merge(&base, &overlay);
        assert!(child(&forward, "/lib").is_leaf());

        let reverse = merge(&overlay, &base);
        assert!(child(&reverse, "/lib").is_dir());
        assert_ne!(forward, reverse);
    }

    #[test]
    fn untagged_generated_node_takes_base_structure() {
        let overlay = FileNode::dir("proj", "/", vec![FileNode::file("src", "/src")]);
        let merged = merge(&base_tree(), &overlay);
        let src = child(&merged, "/src");
        assert!(src.is_dir());
        assert_eq!(src.children().len(), 2);
    }

    #[test]
    fn generated_only_untagged_leaf_is_implicitly_added() {
        let overlay = FileNode::dir(
            "proj",
            "/",
            vec![FileNode::dir(
                "docs",
                "/docs",
                vec![FileNode::file("readme.md", "/docs/readme.md")],
            )],
        );
        let merged = merge(&base_tree(), &overlay);
        assert_eq!(
            child(&merged, "/docs/readme.md").change_type,
            Some(ChangeType::Added)
        );
    }

    #[test]
    fn merge_keeps_base_order_then_generated_only_children() {
        let merged = merge(&base_tree(), &generated());
        let names: Vec<&str> = child(&merged, "/src")
            .children()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["a.ts", "b.ts", "c.ts"]);
    }

    #[test]
    fn empty_trees_merge_and_filter() {
        let empty = FileNode::dir("proj", "/", vec![]);
        let merged = merge(&empty, &empty);
        assert_eq!(merged, empty);
        let view = changed_only(&merged);
        assert!(view.is_dir());
        assert!(view.children().is_empty());
    }

    #[test]
    fn deeply_nested_change_keeps_full_ancestor_chain() {
        let deep = FileNode::dir(
            "proj",
            "/",
            vec![FileNode::dir(
                "a",
                "/a",
                vec![
                    FileNode::dir(
                        "b",
                        "/a/b",
                        vec![FileNode::dir(
                            "c",
                            "/a/b/c",
                            vec![FileNode::file("d.rs", "/a/b/c/d.rs")
                                .with_change(ChangeType::Modified)],
                        )],
                    ),
                    FileNode::file("plain.rs", "/a/plain.rs"),
                ],
            )],
        );
        let view = changed_only(&deep);
        for path in ["/a", "/a/b", "/a/b/c", "/a/b/c/d.rs"] {
            assert!(find(&view, path).is_some(), "{path} must survive");
        }
        assert!(find(&view, "/a/plain.rs").is_none());
    }

    #[test]
    fn deleted_leaf_stays_in_tree() {
        let overlay = FileNode::dir(
            "proj",
            "/",
            vec![FileNode::dir(
                "src",
                "/src",
                vec![FileNode::file("b.ts", "/src/b.ts").with_change(ChangeType::Deleted)],
            )],
        );
        let merged = merge(&base_tree(), &overlay);
        let view = changed_only(&merged);
        let b = child(&view, "/src/b.ts");
        assert!(b.is_leaf());
        assert_eq!(b.change_type, Some(ChangeType::Deleted));
    }

    #[test]
    fn non_root_call_prunes_unchanged_directory() {
        let src = child(&base_tree(), "/src").clone();
        assert!(filter_modified_only(&src, false).is_none());
        assert!(filter_modified_only(&src, true).is_some());
    }

    #[rstest]
    #[case::plain(base_tree())]
    #[case::generated(generated())]
    #[case::merged(merge(&base_tree(), &generated()))]
    #[case::empty(FileNode::dir("proj", "/", vec![]))]
    fn prune_invariant_holds(#[case] tree: FileNode) {
        let view = changed_only(&tree);
        assert_prune_invariant(&view, true);
    }

    #[test]
    fn generated_tree_classifies_entries() {
        let mut files = BTreeMap::new();
        files.insert(
            "src/a.ts".to_string(),
            GeneratedFile {
                content: "a".into(),
                deleted: false,
            },
        );
        files.insert(
            "src/new/c.ts".to_string(),
            GeneratedFile {
                content: "c".into(),
                deleted: false,
            },
        );
        files.insert(
            "src/b.ts".to_string(),
            GeneratedFile {
                content: String::new(),
                deleted: true,
            },
        );
        let on_disk = keys(&base_tree());

        let tree = generated_tree("proj", &files, |p| on_disk.contains(p));

        assert_eq!(
            child(&tree, "/src/a.ts").change_type,
            Some(ChangeType::Modified)
        );
        assert_eq!(
            child(&tree, "/src/b.ts").change_type,
            Some(ChangeType::Deleted)
        );
        assert_eq!(
            child(&tree, "/src/new/c.ts").change_type,
            Some(ChangeType::Added)
        );
        assert!(child(&tree, "/src/new").is_dir());
        assert_eq!(child(&tree, "/src/new").change_type, None);
    }

    #[test]
    fn scan_tree_skips_ignored_and_sorts() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("src/nested")).expect("mkdir");
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).expect("mkdir");
        std::fs::write(dir.path().join("src/b.ts"), "b").expect("write");
        std::fs::write(dir.path().join("src/a.ts"), "a").expect("write");
        std::fs::write(dir.path().join("src/nested/x.ts"), "x").expect("write");
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "").expect("write");

        let tree = scan_tree(dir.path(), &["node_modules".to_string()]).expect("scan");

        assert_eq!(tree.path, ROOT_PATH);
        assert!(find(&tree, "/node_modules").is_none());
        let names: Vec<&str> = child(&tree, "/src")
            .children()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["a.ts", "b.ts", "nested"]);
        assert!(child(&tree, "/src/nested").is_dir());
        assert_eq!(count(&tree), (3, 2));
    }

    #[test]
    fn sort_tree_puts_directories_first() {
        let tree = FileNode::dir(
            "proj",
            "/",
            vec![
                FileNode::file("z.txt", "/z.txt"),
                FileNode::dir("b", "/b", vec![]),
                FileNode::file("a.txt", "/a.txt"),
            ],
        );
        let sorted = sort_tree(&tree);
        let names: Vec<&str> = sorted.children().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a.txt", "z.txt"]);
    }
}
