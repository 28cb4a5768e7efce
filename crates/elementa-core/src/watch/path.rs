#![forbid(unsafe_code)]

//! Watch-path parsing.
//!
//! A property may declare dotted watch paths (`"a.b"`, `"*.d"`, `"**"`)
//! naming the nested members whose mutation should re-render the component.
//! [`WatchTree::parse`] compiles such a list into a prefix tree that a
//! [`Watched`](super::Watched) handle consults on every write.
//!
//! # Rules
//!
//! - A literal segment matches that member name (or array index).
//! - `*` matches any member at its level.
//! - `**` anywhere switches the whole list to [`WatchTree::Deep`]: every
//!   write at every depth is relevant.
//! - The paths under a `*` node are merged into every sibling node, so
//!   `["a", "*.d"]` also watches `a.d` below the literal `a`.
//!
//! # Failure Modes
//!
//! Empty paths and paths with empty segments (`"a..b"`) are ignored; they
//! never match anything and never panic.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexMap;

/// The wildcard segment.
pub const WILDCARD: &str = "*";
/// The deep wildcard segment.
pub const DEEP_WILDCARD: &str = "**";

/// Compiled watch paths.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchTree {
    /// Watch every write at every depth.
    Deep,
    /// Watch only writes matching the tree.
    Paths(Rc<WatchMap>),
}

/// One level of a watch tree: segment to node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchMap {
    nodes: IndexMap<String, WatchNode>,
}

/// A node in a [`WatchMap`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchNode {
    /// Dotted suffix paths relevant below this node, wildcard merges included.
    pub relevant_paths: Vec<String>,
    /// Whether a write to this node itself is relevant.
    pub watch_current: bool,
    /// The next level.
    pub map: Rc<WatchMap>,
}

impl WatchTree {
    /// Compile a list of dotted watch paths.
    pub fn parse<S: AsRef<str>>(paths: &[S]) -> Self {
        let split: Vec<Vec<&str>> = paths
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| p.split('.').collect::<Vec<_>>())
            .filter(|segs| segs.iter().all(|s| !s.is_empty()))
            .collect();

        if split.iter().flatten().any(|seg| *seg == DEEP_WILDCARD) {
            return Self::Deep;
        }
        Self::Paths(Rc::new(WatchMap::build(split)))
    }

    /// Whether the tree watches nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Deep => false,
            Self::Paths(map) => map.is_empty(),
        }
    }

    /// Whether a write at `path` (segments from the property root) is
    /// relevant.
    #[must_use]
    pub fn matches(&self, path: &[&str]) -> bool {
        let Self::Paths(root) = self else {
            return true;
        };
        let Some((last, parents)) = path.split_last() else {
            return false;
        };
        let mut level = Rc::clone(root);
        for seg in parents {
            match level.child(seg) {
                Some(next) => level = next,
                None => return false,
            }
        }
        level.is_relevant(last)
    }
}

impl WatchMap {
    fn build(paths: Vec<Vec<&str>>) -> Self {
        // segment -> (watch_current, suffixes)
        let mut groups: IndexMap<&str, (bool, Vec<Vec<&str>>)> = IndexMap::new();
        for path in paths {
            let Some((head, rest)) = path.split_first() else {
                continue;
            };
            let group = groups.entry(*head).or_default();
            if rest.is_empty() {
                group.0 = true;
            } else if !group.1.iter().any(|p| p.as_slice() == rest) {
                group.1.push(rest.to_vec());
            }
        }

        if let Some((_, star_suffixes)) = groups.get(WILDCARD).cloned() {
            for (seg, group) in &mut groups {
                if *seg == WILDCARD {
                    continue;
                }
                for suffix in &star_suffixes {
                    if !group.1.contains(suffix) {
                        group.1.push(suffix.clone());
                    }
                }
            }
        }

        let nodes = groups
            .into_iter()
            .map(|(seg, (watch_current, suffixes))| {
                let relevant_paths = suffixes.iter().map(|s| s.join(".")).collect();
                let node = WatchNode {
                    relevant_paths,
                    watch_current,
                    map: Rc::new(Self::build(suffixes)),
                };
                (seg.to_owned(), node)
            })
            .collect();
        Self { nodes }
    }

    /// Whether this level has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node for `seg`, without wildcard fallback.
    #[must_use]
    pub fn node(&self, seg: &str) -> Option<&WatchNode> {
        self.nodes.get(seg)
    }

    /// Whether a write to member `seg` at this level is relevant: the literal
    /// node or the `*` node must watch its own level.
    #[must_use]
    pub fn is_relevant(&self, seg: &str) -> bool {
        let literal = self.nodes.get(seg).is_some_and(|n| n.watch_current);
        literal || self.nodes.get(WILDCARD).is_some_and(|n| n.watch_current)
    }

    /// The subtree to apply below member `seg`, or `None` when watching
    /// stops at this depth.
    #[must_use]
    pub fn child(&self, seg: &str) -> Option<Rc<Self>> {
        let node = self.nodes.get(seg).or_else(|| self.nodes.get(WILDCARD))?;
        (!node.map.is_empty()).then(|| Rc::clone(&node.map))
    }
}

/// Memoizes compiled trees per distinct path list.
#[derive(Debug, Default)]
pub struct WatchTreeCache {
    trees: RefCell<AHashMap<Vec<String>, Rc<WatchTree>>>,
}

impl WatchTreeCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled tree for `paths`, parsing it on first use.
    pub fn get_or_parse<S: AsRef<str>>(&self, paths: &[S]) -> Rc<WatchTree> {
        let key: Vec<String> = paths.iter().map(|p| p.as_ref().to_owned()).collect();
        if let Some(tree) = self.trees.borrow().get(&key) {
            return Rc::clone(tree);
        }
        let tree = Rc::new(WatchTree::parse(key.as_slice()));
        self.trees.borrow_mut().insert(key, Rc::clone(&tree));
        tree
    }

    /// Number of distinct path lists compiled so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.borrow().len()
    }

    /// Whether nothing has been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn paths(tree: &WatchTree) -> Rc<WatchMap> {
        match tree {
            WatchTree::Paths(map) => Rc::clone(map),
            WatchTree::Deep => panic!("expected a path tree"),
        }
    }

    #[test]
    fn literal_paths_build_nested_levels() {
        let tree = WatchTree::parse(&["a.b", "a.c", "x"]);
        let root = paths(&tree);
        let a = root.node("a").unwrap();
        assert!(!a.watch_current);
        assert_eq!(a.relevant_paths, vec!["b", "c"]);
        assert!(a.map.is_relevant("b"));
        assert!(root.is_relevant("x"));
        assert!(!root.is_relevant("a"));
    }

    #[test]
    fn deep_wildcard_anywhere_switches_to_deep() {
        assert_eq!(WatchTree::parse(&["a.b", "c.**"]), WatchTree::Deep);
        assert!(WatchTree::parse(&["**"]).matches(&["any", "depth", "at", "all"]));
    }

    #[test]
    fn wildcard_paths_merge_into_siblings() {
        let tree = WatchTree::parse(&["a", "*.d"]);
        let root = paths(&tree);
        let a = root.node("a").unwrap();
        assert!(a.watch_current);
        assert_eq!(a.relevant_paths, vec!["d"]);
        assert!(tree.matches(&["a", "d"]));
        assert!(tree.matches(&["a"]));
    }

    #[test]
    fn wildcard_without_sibling_does_not_match_other_leaves() {
        let tree = WatchTree::parse(&["*.d"]);
        assert!(tree.matches(&["a", "d"]));
        assert!(tree.matches(&["zzz", "d"]));
        assert!(!tree.matches(&["a", "e"]));
        assert!(!tree.matches(&["a"]));
    }

    #[test]
    fn merge_deduplicates() {
        let tree = WatchTree::parse(&["a.d", "*.d", "a.d"]);
        let a = paths(&tree).node("a").unwrap().clone();
        assert_eq!(a.relevant_paths, vec!["d"]);
    }

    #[test]
    fn exhausted_subtree_has_no_child() {
        let tree = WatchTree::parse(&["a"]);
        let root = paths(&tree);
        assert!(root.child("a").is_none());
        assert!(root.child("b").is_none());
    }

    #[test]
    fn malformed_paths_never_match() {
        let tree = WatchTree::parse(&["", "a..b", "."]);
        assert!(tree.is_empty());
        assert!(!tree.matches(&["a", "b"]));
        assert!(!tree.matches(&[]));
    }

    #[test]
    fn cache_reuses_trees() {
        let cache = WatchTreeCache::new();
        let first = cache.get_or_parse(&["a.b"]);
        let second = cache.get_or_parse(&["a.b"]);
        assert!(Rc::ptr_eq(&first, &second));
        cache.get_or_parse(&["a"]);
        assert_eq!(cache.len(), 2);
    }

    proptest! {
        #[test]
        fn literal_path_always_matches_itself(segs in prop::collection::vec("[a-z]{1,4}", 1..5)) {
            let dotted = segs.join(".");
            let tree = WatchTree::parse(&[dotted]);
            let refs: Vec<&str> = segs.iter().map(String::as_str).collect();
            prop_assert!(tree.matches(&refs));
        }

        #[test]
        fn wildcard_matches_any_head(head in "[a-z]{1,6}", tail in "[a-z]{1,6}") {
            let tree = WatchTree::parse(&[format!("*.{tail}")]);
            prop_assert!(tree.matches(&[head.as_str(), tail.as_str()]));
        }
    }
}
