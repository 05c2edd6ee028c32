//! The shared task registry: a mutable arena of named task nodes.
//!
//! Nodes reference each other by key, never by pointer, which is what makes
//! the cross-compilation graph surgery a well-defined single-owner
//! operation: rewriting one node's prerequisite list cannot invalidate
//! anything another node holds.
//!
//! Registration is get-or-insert. At most one node exists per key; defining
//! the same subgraph twice yields the exact same node and edge set, because
//! re-registration hands back the existing node instead of overwriting it
//! (which would silently drop the earlier edges).

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use camino::Utf8Path;

use crate::error::TaskResult;
use crate::session::Session;

/// What a task node represents, which decides when the runner executes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Pure aggregation or named work; runs whenever invoked.
    Phony,
    /// A filesystem artifact; runs when the file is missing or stale.
    File,
    /// A directory; created if absent, never an error if it exists.
    Directory,
}

/// Snapshot of a node handed to its actions at execution time.
///
/// Actions receive the prerequisite list as it was when the node was
/// visited. The Makefile action uses prerequisite-set membership as its only
/// discriminator between host and cross builds, so the snapshot is part of
/// the contract.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Key of the executing node.
    pub key: Box<str>,
    /// Prerequisite keys at visit time.
    pub prereqs: Vec<Box<str>>,
}

impl Invocation {
    /// Whether any prerequisite path has the given file name.
    pub fn has_prereq_named(&self, file_name: &str) -> bool {
        self.prereqs
            .iter()
            .any(|p| Utf8Path::new(p.as_ref()).file_name() == Some(file_name))
    }
}

type ActionFnPtr = Arc<dyn Fn(&mut Session, &Invocation) -> TaskResult<()> + Send + Sync>;

/// Wraps `ActionFnPtr` and implements `Debug` trait for function pointer.
#[derive(Clone)]
pub(crate) struct Action(ActionFnPtr);

impl Action {
    pub(crate) fn call(&self, session: &mut Session, inv: &Invocation) -> TaskResult<()> {
        (self.0)(session, inv)
    }
}

impl Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Action(*)")
    }
}

/// A named unit of work: a key, an ordered prerequisite list and zero or
/// more actions. Umbrella nodes are phony and usually action-less; the
/// `cross` umbrella accumulates one surgery action per cross combination.
#[derive(Debug)]
pub struct TaskNode {
    key: Box<str>,
    kind: TaskKind,
    prereqs: Vec<Box<str>>,
    pub(crate) actions: Vec<Action>,
}

impl TaskNode {
    fn new(key: Box<str>, kind: TaskKind) -> Self {
        Self {
            key,
            kind,
            prereqs: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn prereqs(&self) -> &[Box<str>] {
        &self.prereqs
    }

    pub fn has_prereq(&self, key: &str) -> bool {
        self.prereqs.iter().any(|p| p.as_ref() == key)
    }

    /// Add a prerequisite edge. Duplicates are ignored, so wiring the same
    /// edge from two construction passes is harmless.
    pub(crate) fn prereq(&mut self, key: impl Into<Box<str>>) -> &mut Self {
        let key = key.into();
        if !self.has_prereq(&key) {
            self.prereqs.push(key);
        }
        self
    }

    /// Append an action.
    pub(crate) fn action<F>(&mut self, func: F) -> &mut Self
    where
        F: Fn(&mut Session, &Invocation) -> TaskResult<()> + Send + Sync + 'static,
    {
        self.actions.push(Action(Arc::new(func)));
        self
    }

    /// Remove a single prerequisite edge, if present. Surgery only.
    pub(crate) fn remove_prereq(&mut self, key: &str) -> &mut Self {
        self.prereqs.retain(|p| p.as_ref() != key);
        self
    }

    /// Drop every prerequisite edge. Surgery only.
    pub(crate) fn clear_prereqs(&mut self) -> &mut Self {
        self.prereqs.clear();
        self
    }
}

/// Process-wide map from key to task node, shared by every component for
/// the lifetime of one build session.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    nodes: BTreeMap<Box<str>, TaskNode>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&TaskNode> {
        self.nodes.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut TaskNode> {
        self.nodes.get_mut(key)
    }

    /// Get-or-insert a node. An existing node is returned as-is; its kind is
    /// not rewritten.
    pub(crate) fn register(&mut self, key: impl Into<Box<str>>, kind: TaskKind) -> &mut TaskNode {
        let key = key.into();
        self.nodes
            .entry(key.clone())
            .or_insert_with(|| TaskNode::new(key, kind))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|k| k.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskNode)> {
        self.nodes.iter().map(|(k, n)| (k.as_ref(), n))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_register_is_get_or_insert() {
        let mut registry = TaskRegistry::new();
        registry.register("compile", TaskKind::Phony).prereq("a");
        registry.register("compile", TaskKind::File).prereq("b");

        let node = registry.get("compile").unwrap();
        assert_eq!(node.kind(), TaskKind::Phony);
        assert_eq!(node.prereqs().len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_prereq_dedup() {
        let mut registry = TaskRegistry::new();
        registry
            .register("compile", TaskKind::Phony)
            .prereq("copy:foo")
            .prereq("copy:foo");

        assert_eq!(registry.get("compile").unwrap().prereqs().len(), 1);
    }

    #[test]
    fn test_remove_and_clear_prereqs() {
        let mut registry = TaskRegistry::new();
        registry
            .register("compile", TaskKind::Phony)
            .prereq("a")
            .prereq("b");

        registry.get_mut("compile").unwrap().remove_prereq("a");
        assert_eq!(registry.get("compile").unwrap().prereqs(), ["b".into()]);

        registry.get_mut("compile").unwrap().clear_prereqs();
        assert!(registry.get("compile").unwrap().prereqs().is_empty());
    }

    #[test]
    fn test_invocation_prereq_membership() {
        let inv = Invocation {
            key: "tmp/x86_64-linux/foo/3.2.0/Makefile".into(),
            prereqs: vec![
                "tmp/x86_64-linux/foo/3.2.0".into(),
                "tmp/x86_64-linux/foo/3.2.0/fake.rt".into(),
            ],
        };

        assert!(inv.has_prereq_named("fake.rt"));
        assert!(!inv.has_prereq_named("rtconfig.rt"));
    }
}
