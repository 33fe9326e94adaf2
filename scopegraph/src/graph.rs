// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Graph structure: node storage, parent/child links, typed access, validation.

use alloc::boxed::Box;
use alloc::vec::Vec;

use tracing::debug;

use crate::capability::{Capabilities, CapabilitySet, ErasedNode, Node, Relation, Slot};
use crate::error::{Error, Result};
use crate::signal::{AgentAdded, Lineage};
use crate::types::{NodeId, NodeKind, ShortCircuit};

/// A forest of agents and scopes connected by parent/child edges.
///
/// Each node has at most one parent; the parent's child list is the owning
/// relation and keeps insertion order, which is also the order in which
/// downward deliveries visit children. Signals only ever travel along these
/// edges, so independent roots never see each other's signals.
///
/// ## Example
///
/// ```rust
/// use scopegraph::{Accepts, Capabilities, Context, Delivery, Graph, Node, NodeKind, signal};
///
/// #[derive(Debug, Default)]
/// struct Changed;
/// signal!(Changed);
///
/// #[derive(Default)]
/// struct Window {
///     dirty: bool,
/// }
///
/// impl Accepts<Changed> for Window {
///     fn on_signal(&mut self, _: &mut Changed, _: &mut Context<'_>) {
///         self.dirty = true;
///     }
/// }
///
/// impl Node for Window {
///     const KIND: NodeKind = NodeKind::Scope;
///
///     fn declare(caps: &mut Capabilities<Self>) {
///         caps.accepts::<Changed>();
///     }
/// }
///
/// struct Label;
///
/// impl Node for Label {
///     fn declare(caps: &mut Capabilities<Self>) {
///         caps.provides::<Changed>();
///     }
/// }
///
/// let mut graph = Graph::new();
/// let window = graph.insert(None, Window::default()).unwrap();
/// let label = graph.insert(Some(window), Label).unwrap();
/// graph.validate().unwrap();
///
/// let delivery = graph.send(label, &mut Changed).unwrap();
/// assert_eq!(delivery, Delivery::Accepted(window));
/// assert!(graph.get::<Window>(window).unwrap().dirty);
/// ```
pub struct Graph {
    /// slots
    nodes: Vec<Option<Entry>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    pub(crate) short_circuit: ShortCircuit,
}

pub(crate) struct Entry {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    pub(crate) type_name: &'static str,
    pub(crate) caps: CapabilitySet,
    /// Taken out while one of the node's handlers runs.
    pub(crate) object: Option<Box<dyn ErasedNode>>,
}

impl core::fmt::Debug for Graph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("Graph")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &free)
            .field("short_circuit", &self.short_circuit)
            .finish_non_exhaustive()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create an empty graph with the default [`ShortCircuit`] policy.
    pub fn new() -> Self {
        Self::with_short_circuit(ShortCircuit::default())
    }

    /// Create an empty graph with an explicit [`ShortCircuit`] policy.
    pub fn with_short_circuit(policy: ShortCircuit) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            short_circuit: policy,
        }
    }

    /// The policy applied when a filter stops propagation.
    pub fn short_circuit(&self) -> ShortCircuit {
        self.short_circuit
    }

    /// Change the policy applied when a filter stops propagation.
    pub fn set_short_circuit(&mut self, policy: ShortCircuit) {
        self.short_circuit = policy;
    }

    /// Insert `node` as a child of `parent` (or as a root if `None`).
    ///
    /// The node's capabilities are collected and checked here: agents may not
    /// declare scope-only relations, and only scopes may become parents.
    /// After linking, an [`AgentAdded`] signal is sent upward from the new node.
    pub fn insert<N: Node>(&mut self, parent: Option<NodeId>, node: N) -> Result<NodeId> {
        let type_name = core::any::type_name::<N>();
        if let Some(p) = parent {
            self.ensure_scope(p)?;
        }
        let (caps, handlers) = Capabilities::<N>::collect().split();
        if N::KIND == NodeKind::Agent
            && let Some((relation, key)) = caps.first_scope_only()
        {
            return Err(Error::AgentCapability {
                node: type_name,
                relation,
                signal: key.name(),
            });
        }

        let id = self.allocate(Entry {
            generation: 0,
            parent: None,
            children: Vec::new(),
            kind: N::KIND,
            type_name,
            caps,
            object: Some(Slot::boxed(node, handlers)),
        });
        if let Some(p) = parent {
            self.link_parent(id, p);
        }
        debug!(node = ?id, kind = type_name, parent = ?parent, "inserted");

        self.dispatch_up(id, &mut AgentAdded { node: id });
        Ok(id)
    }

    /// Remove a node (and its subtree) from the graph.
    ///
    /// Identifiers of removed nodes become stale immediately. Stale ids are ignored.
    pub fn remove(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.entry_ref(id).parent {
            self.unlink_parent(id, parent);
        }
        let children = core::mem::take(&mut self.entry_mut_ref(id).children);
        for child in children {
            self.remove(child);
        }
        debug!(node = ?id, kind = self.entry_ref(id).type_name, "removed");
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Move `id` under `new_parent` (or make it a root), appending it to the
    /// new parent's children.
    ///
    /// Sends [`AgentAdded`] upward from `id` once it is linked.
    pub fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> Result<()> {
        if !self.is_alive(id) {
            return Err(Error::StaleNode(id));
        }
        if let Some(p) = new_parent {
            self.ensure_scope(p)?;
            let mut current = Some(p);
            while let Some(ancestor) = current {
                if ancestor == id {
                    return Err(Error::Cycle(id));
                }
                current = self.parent_of(ancestor);
            }
        }
        if let Some(parent) = self.entry_ref(id).parent {
            self.unlink_parent(id, parent);
        }
        if let Some(p) = new_parent {
            self.link_parent(id, p);
        }
        debug!(node = ?id, parent = ?new_parent, "reparented");

        self.dispatch_up(id, &mut AgentAdded { node: id });
        Ok(())
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Returns true if the graph holds no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the parent of a node if live, or `None` for roots or stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).and_then(|e| e.parent)
    }

    /// Get the children of a node in insertion order, or an empty slice if the node is stale.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Returns the root of the tree containing `id`.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.entry(id).map(|_| id)?;
        while let Some(parent) = self.parent_of(current) {
            current = parent;
        }
        Some(current)
    }

    /// Returns the kind of a live node.
    pub fn kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.entry(id).map(|e| e.kind)
    }

    /// Returns the type name of a live node.
    pub fn type_name_of(&self, id: NodeId) -> Option<&'static str> {
        self.entry(id).map(|e| e.type_name)
    }

    /// Returns the declared capabilities of a live node.
    pub fn capabilities_of(&self, id: NodeId) -> Option<&CapabilitySet> {
        self.entry(id).map(|e| &e.caps)
    }

    /// Borrow the node behind `id` as an `N`.
    ///
    /// Returns `None` for stale ids, for a different node type, and while one
    /// of the node's own handlers is running.
    pub fn get<N: Node>(&self, id: NodeId) -> Option<&N> {
        self.entry(id)?
            .object
            .as_ref()?
            .as_any()
            .downcast_ref::<Slot<N>>()
            .map(|slot| &slot.node)
    }

    /// Mutably borrow the node behind `id` as an `N`.
    pub fn get_mut<N: Node>(&mut self, id: NodeId) -> Option<&mut N> {
        self.entry_mut(id)?
            .object
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<Slot<N>>()
            .map(|slot| &mut slot.node)
    }

    /// Check that every provided signal can reach an acceptor.
    ///
    /// For each live node and each signal it `Provides`, walk toward the root:
    /// an ancestor that accepts it (or accepts it as an inner signal) satisfies
    /// the declaration, an ancestor that passes it up continues the walk, and
    /// anything else fails with [`Error::NoAcceptor`].
    ///
    /// Each signal a non-root scope `ProvidesInner` needs a child that accepts
    /// or filters it, or a child scope that may relay it further down;
    /// otherwise validation fails with [`Error::NoInnerAcceptor`]. Roots
    /// broadcast to whatever gets attached to them and are not checked.
    pub fn validate(&self) -> Result<()> {
        for (idx, slot) in self.nodes.iter().enumerate() {
            let Some(entry) = slot else {
                continue;
            };
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices."
            )]
            let id = NodeId::new(idx as u32, entry.generation);
            for lineage in entry.caps.provided() {
                if !self.has_acceptor(id, lineage) {
                    return Err(Error::NoAcceptor {
                        id,
                        node: entry.type_name,
                        signal: lineage.first().map(|k| k.name()).unwrap_or_default(),
                    });
                }
            }
            if entry.parent.is_none() {
                continue;
            }
            for lineage in entry.caps.provided_inner() {
                if !self.has_inner_acceptor(entry, lineage) {
                    return Err(Error::NoInnerAcceptor {
                        id,
                        node: entry.type_name,
                        signal: lineage.first().map(|k| k.name()).unwrap_or_default(),
                    });
                }
            }
        }
        Ok(())
    }

    fn has_inner_acceptor(&self, scope: &Entry, lineage: &Lineage) -> bool {
        scope.children.iter().any(|&child| {
            self.entry(child).is_some_and(|entry| {
                entry.kind == NodeKind::Scope
                    || entry.caps.declares(Relation::Accepts, lineage)
                    || entry.caps.declares(Relation::FiltersDown, lineage)
            })
        })
    }

    fn has_acceptor(&self, from: NodeId, lineage: &Lineage) -> bool {
        let mut current = self.parent_of(from);
        while let Some(id) = current {
            let Some(entry) = self.entry(id) else {
                return false;
            };
            if entry.caps.declares(Relation::Accepts, lineage)
                || entry.caps.declares(Relation::AcceptsInner, lineage)
            {
                return true;
            }
            if !entry.caps.declares(Relation::PassesUp, lineage) {
                return false;
            }
            current = entry.parent;
        }
        false
    }

    // --- internals ---

    pub(crate) fn entry(&self, id: NodeId) -> Option<&Entry> {
        self.nodes
            .get(id.idx())?
            .as_ref()
            .filter(|e| e.generation == id.1)
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        self.nodes
            .get_mut(id.idx())?
            .as_mut()
            .filter(|e| e.generation == id.1)
    }

    /// Access an entry; panics if `id` is stale.
    fn entry_ref(&self, id: NodeId) -> &Entry {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    /// Access an entry mutably; panics if `id` is stale.
    fn entry_mut_ref(&mut self, id: NodeId) -> &mut Entry {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    fn ensure_scope(&self, id: NodeId) -> Result<()> {
        let entry = self.entry(id).ok_or(Error::StaleNode(id))?;
        if entry.kind == NodeKind::Scope {
            Ok(())
        } else {
            Err(Error::NotAScope {
                id,
                name: entry.type_name,
            })
        }
    }

    fn allocate(&mut self, mut entry: Entry) -> NodeId {
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            entry.generation = generation;
            self.nodes[idx] = Some(entry);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices."
            )]
            NodeId::new(idx as u32, generation)
        } else {
            let generation = 1_u32;
            entry.generation = generation;
            self.nodes.push(Some(entry));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices."
            )]
            NodeId::new((self.nodes.len() - 1) as u32, generation)
        }
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId) {
        self.entry_mut_ref(parent).children.push(id);
        self.entry_mut_ref(id).parent = Some(parent);
    }

    fn unlink_parent(&mut self, id: NodeId, parent: NodeId) {
        self.entry_mut_ref(parent).children.retain(|c| *c != id);
        self.entry_mut_ref(id).parent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Accepts, AcceptsInner};
    use crate::dispatch::Context;
    use crate::signal;
    use alloc::vec;

    #[derive(Debug, Default)]
    struct Note;
    signal!(Note);

    #[derive(Default)]
    struct Group {
        added: Vec<NodeId>,
    }

    impl AcceptsInner<AgentAdded> for Group {
        fn on_inner_signal(&mut self, signal: &mut AgentAdded, _: &mut Context<'_>) {
            self.added.push(signal.node);
        }
    }

    impl Node for Group {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts_inner::<AgentAdded>();
        }
    }

    struct Leaf;

    impl Node for Leaf {
        fn declare(caps: &mut Capabilities<Self>) {
            caps.provides::<Note>();
        }
    }

    struct Sink;

    impl Accepts<Note> for Sink {
        fn on_signal(&mut self, _: &mut Note, _: &mut Context<'_>) {}
    }

    impl Node for Sink {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts::<Note>();
        }
    }

    struct Relay;

    impl Node for Relay {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.passes_up::<Note>();
        }
    }

    struct BadAgent;

    impl Node for BadAgent {
        fn declare(caps: &mut Capabilities<Self>) {
            caps.passes_up::<Note>();
        }
    }

    #[test]
    fn liveness_insert_remove_reuse() {
        let mut graph = Graph::new();
        let root = graph.insert(None, Group::default()).unwrap();
        let a = graph.insert(Some(root), Leaf).unwrap();
        assert!(graph.is_alive(root));
        assert!(graph.is_alive(a));
        assert_eq!(graph.len(), 2);

        graph.remove(a);
        assert!(!graph.is_alive(a));

        // Slot is reused, but the generation bumps.
        let b = graph.insert(Some(root), Leaf).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.0, b.0, "freed slot should be reused");
        assert!(graph.get::<Leaf>(a).is_none());
        assert!(graph.get::<Leaf>(b).is_some());
        assert_eq!(graph.children_of(root), &[b]);
    }

    #[test]
    fn remove_detaches_subtree() {
        let mut graph = Graph::new();
        let root = graph.insert(None, Group::default()).unwrap();
        let mid = graph.insert(Some(root), Group::default()).unwrap();
        let leaf = graph.insert(Some(mid), Leaf).unwrap();

        graph.remove(mid);
        assert!(!graph.is_alive(mid));
        assert!(!graph.is_alive(leaf));
        assert!(graph.children_of(root).is_empty());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn agents_cannot_own_children() {
        let mut graph = Graph::new();
        let leaf = graph.insert(None, Leaf).unwrap();
        let err = graph.insert(Some(leaf), Leaf).unwrap_err();
        assert!(matches!(err, Error::NotAScope { id, .. } if id == leaf));
    }

    #[test]
    fn agents_cannot_declare_scope_relations() {
        let mut graph = Graph::new();
        let err = graph.insert(None, BadAgent).unwrap_err();
        assert!(matches!(
            err,
            Error::AgentCapability {
                relation: Relation::PassesUp,
                ..
            }
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn stale_parent_is_rejected() {
        let mut graph = Graph::new();
        let root = graph.insert(None, Group::default()).unwrap();
        graph.remove(root);
        assert_eq!(
            graph.insert(Some(root), Leaf).unwrap_err(),
            Error::StaleNode(root)
        );
    }

    #[test]
    fn scopes_observe_added_agents() {
        let mut graph = Graph::new();
        let root = graph.insert(None, Group::default()).unwrap();
        let a = graph.insert(Some(root), Leaf).unwrap();
        let b = graph.insert(Some(root), Leaf).unwrap();
        assert_eq!(graph.get::<Group>(root).unwrap().added, vec![a, b]);
    }

    #[test]
    fn reparent_moves_and_rejects_cycles() {
        let mut graph = Graph::new();
        let root = graph.insert(None, Group::default()).unwrap();
        let left = graph.insert(Some(root), Group::default()).unwrap();
        let right = graph.insert(Some(root), Group::default()).unwrap();
        let leaf = graph.insert(Some(left), Leaf).unwrap();

        graph.reparent(leaf, Some(right)).unwrap();
        assert!(graph.children_of(left).is_empty());
        assert_eq!(graph.children_of(right), &[leaf]);
        assert_eq!(graph.parent_of(leaf), Some(right));
        assert_eq!(graph.get::<Group>(right).unwrap().added, vec![leaf]);

        assert_eq!(graph.reparent(root, Some(right)), Err(Error::Cycle(root)));
        assert_eq!(graph.reparent(right, Some(right)), Err(Error::Cycle(right)));
        assert_eq!(graph.root_of(leaf), Some(root));
    }

    #[test]
    fn validate_follows_passes_up() {
        let mut graph = Graph::new();
        let sink = graph.insert(None, Sink).unwrap();
        let relay = graph.insert(Some(sink), Relay).unwrap();
        let leaf = graph.insert(Some(relay), Leaf).unwrap();
        assert_eq!(graph.validate(), Ok(()));

        let group = graph.insert(Some(sink), Group::default()).unwrap();
        let blocked = graph.insert(Some(group), Leaf).unwrap();
        let err = graph.validate().unwrap_err();
        assert!(matches!(err, Error::NoAcceptor { id, .. } if id == blocked));

        graph.remove(blocked);
        graph.remove(leaf);
        graph.insert(None, Leaf).unwrap();
        assert!(graph.validate().is_err(), "a root provider has no acceptor");
    }

    struct Broadcaster;

    impl Node for Broadcaster {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.provides_inner::<Note>();
        }
    }

    struct Mute;

    impl Node for Mute {
        fn declare(_: &mut Capabilities<Self>) {}
    }

    #[test]
    fn validate_checks_inner_providers_have_receivers() {
        let mut graph = Graph::new();
        let root = graph.insert(None, Group::default()).unwrap();
        let lonely = graph.insert(Some(root), Broadcaster).unwrap();
        let err = graph.validate().unwrap_err();
        assert!(matches!(err, Error::NoInnerAcceptor { id, .. } if id == lonely));

        // An agent that does not handle the signal does not help.
        graph.insert(Some(lonely), Mute).unwrap();
        assert!(graph.validate().is_err());

        graph.insert(Some(lonely), Sink).unwrap();
        assert_eq!(graph.validate(), Ok(()));

        let relaying = graph.insert(Some(root), Broadcaster).unwrap();
        assert!(graph.validate().is_err());
        graph.insert(Some(relaying), Group::default()).unwrap();
        assert_eq!(graph.validate(), Ok(()), "a child scope may relay the signal");

        // Roots are not checked.
        graph.insert(None, Broadcaster).unwrap();
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn typed_access_checks_type() {
        let mut graph = Graph::new();
        let root = graph.insert(None, Group::default()).unwrap();
        assert!(graph.get::<Sink>(root).is_none());
        graph.get_mut::<Group>(root).unwrap().added.clear();
        assert_eq!(graph.kind_of(root), Some(NodeKind::Scope));
        assert!(graph.type_name_of(root).unwrap().ends_with("Group"));
    }
}
