// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dispatch: upward sends, filtered downward delivery, and the handler context.
//!
//! ## Upward
//!
//! [`Graph::send`] walks from the sender's parent toward the root. At each
//! ancestor:
//!
//! - if it `Accepts` the signal, its handler runs and the walk ends ([`Delivery::Accepted`]);
//! - else if it `AcceptsInner` the signal, its inner handler runs and the walk
//!   continues only if it also `PassesUp` the signal ([`Delivery::Absorbed`] otherwise);
//! - else if it `PassesUp` the signal, the walk continues;
//! - else the signal is dropped ([`Delivery::Dropped`]), as it is when the root is passed.
//!
//! ## Downward
//!
//! [`Graph::send_down`] visits a node and then its subtree, depth first:
//!
//! 1. If the node `FiltersDown` the signal, `filter_down` runs. Returning
//!    `false` ends delivery at this node: neither its children nor its own
//!    `Accepts` handler see the signal, and whether `unfilter_down` still runs
//!    is decided by the graph's [`ShortCircuit`] policy.
//! 2. Children are visited in insertion order.
//! 3. `unfilter_down` runs once, seeing everything the children wrote.
//! 4. If the node `Accepts` the signal, its handler runs last, in the node's
//!    own (unfiltered) coordinates.
//!
//! A scope sending into its own subtree with [`Context::send_inner`] starts at
//! step 2: it never filters its own inner signals.
//!
//! ## Reentrancy
//!
//! Handlers may send further signals. A node whose handler is currently
//! running is never re-entered; such a delivery is skipped, logged, and
//! reported as [`Delivery::Busy`] for upward sends.

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::capability::{Hook, Node, Relation};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::signal::{Lineage, Signal, SignalKey, lineage_of};
use crate::types::{Delivery, NodeId, ShortCircuit};

fn signal_name(lineage: &Lineage) -> &'static str {
    lineage.first().map(SignalKey::name).unwrap_or_default()
}

impl Graph {
    /// Send `signal` upward from `from` and report where it ended.
    pub fn send<S: Signal>(&mut self, from: NodeId, signal: &mut S) -> Result<Delivery> {
        if !self.is_alive(from) {
            return Err(Error::StaleNode(from));
        }
        Ok(self.dispatch_up(from, signal))
    }

    /// Deliver `signal` to `to` and its subtree.
    ///
    /// Filters of `to`'s ancestors are not applied; the caller is expected to
    /// start at the node whose coordinate space `signal` is expressed in,
    /// typically a root.
    pub fn send_down<S: Signal>(&mut self, to: NodeId, signal: &mut S) -> Result<()> {
        if !self.is_alive(to) {
            return Err(Error::StaleNode(to));
        }
        let lineage = lineage_of::<S>();
        self.deliver(to, signal, &lineage);
        Ok(())
    }

    pub(crate) fn dispatch_up(&mut self, from: NodeId, signal: &mut dyn Signal) -> Delivery {
        let lineage = signal.lineage();
        let mut current = self.parent_of(from);
        while let Some(id) = current {
            let Some(entry) = self.entry(id) else {
                break;
            };
            let accept = entry.caps.find(Relation::Accepts, &lineage);
            let inner = entry.caps.find(Relation::AcceptsInner, &lineage);
            let passes = entry.caps.declares(Relation::PassesUp, &lineage);

            if let Some(key) = accept {
                if self.invoke(id, Hook::Accept, key, signal).is_none() {
                    return Delivery::Busy(id);
                }
                trace!(signal = signal_name(&lineage), node = ?id, "accepted");
                return Delivery::Accepted(id);
            }
            if let Some(key) = inner {
                if self.invoke(id, Hook::AcceptInner, key, signal).is_none() {
                    return Delivery::Busy(id);
                }
                if !passes {
                    trace!(signal = signal_name(&lineage), node = ?id, "absorbed");
                    return Delivery::Absorbed(id);
                }
            } else if !passes {
                trace!(signal = signal_name(&lineage), node = ?id, "not passed up, dropped");
                return Delivery::Dropped;
            }
            current = self.parent_of(id);
        }
        trace!(signal = signal_name(&lineage), "reached the root, dropped");
        Delivery::Dropped
    }

    pub(crate) fn deliver(&mut self, id: NodeId, signal: &mut dyn Signal, lineage: &Lineage) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let filter = entry.caps.find(Relation::FiltersDown, lineage);
        let accept = entry.caps.find(Relation::Accepts, lineage);

        if let Some(key) = filter {
            match self.invoke(id, Hook::Filter, key, signal) {
                Some(true) => {}
                Some(false) => {
                    trace!(signal = signal_name(lineage), node = ?id, "filter stopped propagation");
                    if self.short_circuit == ShortCircuit::AlwaysUnfilter {
                        self.invoke(id, Hook::Unfilter, key, signal);
                    }
                    return;
                }
                None => return,
            }
        }

        self.deliver_children(id, signal, lineage);

        if let Some(key) = filter {
            self.invoke(id, Hook::Unfilter, key, signal);
        }
        if let Some(key) = accept {
            self.invoke(id, Hook::Accept, key, signal);
        }
    }

    pub(crate) fn deliver_children(
        &mut self,
        id: NodeId,
        signal: &mut dyn Signal,
        lineage: &Lineage,
    ) {
        // Snapshot: handlers may add or remove children while we iterate.
        let children: SmallVec<[NodeId; 8]> = self.children_of(id).iter().copied().collect();
        for child in children {
            if self.parent_of(child) == Some(id) {
                self.deliver(child, signal, lineage);
            }
        }
    }

    /// Run one handler of `id` with the node object checked out of the graph.
    ///
    /// Returns `None` if the node is gone or busy, else the handler's filter
    /// decision (`true` for hooks that have none).
    fn invoke(
        &mut self,
        id: NodeId,
        hook: Hook,
        key: SignalKey,
        signal: &mut dyn Signal,
    ) -> Option<bool> {
        let entry = self.entry_mut(id)?;
        let Some(mut object) = entry.object.take() else {
            warn!(
                node = ?id,
                kind = entry.type_name,
                signal = key.name(),
                ?hook,
                "node is already handling a signal, skipping reentrant delivery"
            );
            return None;
        };

        let outcome = signal.project_mut(key.id()).and_then(|projected| {
            let mut cx = Context {
                graph: self,
                node: id,
            };
            object.invoke(hook, key.id(), projected, &mut cx)
        });

        // The node may have removed itself; a reused slot has a new generation.
        if let Some(entry) = self.entry_mut(id) {
            entry.object = Some(object);
        }
        Some(outcome.unwrap_or(true))
    }
}

/// Access to the graph from inside a handler.
///
/// The node running the handler is checked out of the graph for the
/// duration of the call, so the context can hand out full mutable access to
/// the rest of the graph.
pub struct Context<'g> {
    graph: &'g mut Graph,
    node: NodeId,
}

impl core::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl Context<'_> {
    /// The node whose handler is running.
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// The parent of the running node.
    pub fn parent(&self) -> Option<NodeId> {
        self.graph.parent_of(self.node)
    }

    /// The children of the running node, in insertion order.
    pub fn children(&self) -> &[NodeId] {
        self.graph.children_of(self.node)
    }

    /// Read-only view of the whole graph.
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Send `signal` upward from the running node.
    ///
    /// Fails with [`Error::Undeclared`] unless the node `Provides` the signal
    /// (or one of its categories).
    pub fn send<S: Signal>(&mut self, signal: &mut S) -> Result<Delivery> {
        let lineage = lineage_of::<S>();
        self.check(Relation::Provides, &lineage)?;
        Ok(self.graph.dispatch_up(self.node, signal))
    }

    /// Deliver `signal` to the running node's children and their subtrees.
    ///
    /// Fails with [`Error::Undeclared`] unless the node `ProvidesInner` the signal.
    pub fn send_inner<S: Signal>(&mut self, signal: &mut S) -> Result<()> {
        let lineage = lineage_of::<S>();
        self.check(Relation::ProvidesInner, &lineage)?;
        self.graph.deliver_children(self.node, signal, &lineage);
        Ok(())
    }

    /// Insert a child under the running node.
    ///
    /// The running node itself does not observe the resulting
    /// [`AgentAdded`](crate::AgentAdded), since it is busy.
    pub fn insert_child<N: Node>(&mut self, node: N) -> Result<NodeId> {
        self.graph.insert(Some(self.node), node)
    }

    /// Remove a node and its subtree. The running node may remove itself.
    pub fn remove(&mut self, id: NodeId) {
        self.graph.remove(id);
    }

    fn check(&self, relation: Relation, lineage: &Lineage) -> Result<()> {
        let entry = self
            .graph
            .entry(self.node)
            .ok_or(Error::StaleNode(self.node))?;
        if entry.caps.declares(relation, lineage) {
            Ok(())
        } else {
            Err(Error::Undeclared {
                node: entry.type_name,
                relation,
                signal: signal_name(lineage),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Accepts, AcceptsInner, Capabilities, FiltersDown};
    use crate::signal;
    use crate::types::NodeKind;
    use alloc::vec;
    use alloc::vec::Vec;

    /// Upward signal that records every handler it passes through.
    #[derive(Debug, Default)]
    struct Ping {
        trail: Vec<&'static str>,
    }

    /// Downward query: filters scale `value`, leaves record what they saw.
    #[derive(Debug, Default)]
    struct Tally {
        value: i32,
        trail: Vec<(&'static str, i32)>,
    }

    /// A more specific tally, to exercise category matching.
    #[derive(Debug, Default)]
    struct DeepTally {
        tally: Tally,
    }

    signal!(Ping);
    signal!(Tally);
    signal!(DeepTally: Tally = tally);

    /// Terminal acceptor of pings.
    struct Sink;

    impl Accepts<Ping> for Sink {
        fn on_signal(&mut self, signal: &mut Ping, _: &mut Context<'_>) {
            signal.trail.push("sink");
        }
    }

    impl Node for Sink {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts::<Ping>();
        }
    }

    /// Observes pings from its subtree and relays them.
    struct Listener;

    impl AcceptsInner<Ping> for Listener {
        fn on_inner_signal(&mut self, signal: &mut Ping, _: &mut Context<'_>) {
            signal.trail.push("listener");
        }
    }

    impl Node for Listener {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts_inner::<Ping>().passes_up::<Ping>();
        }
    }

    /// Observes pings from its subtree and keeps them.
    struct Absorber;

    impl AcceptsInner<Ping> for Absorber {
        fn on_inner_signal(&mut self, signal: &mut Ping, _: &mut Context<'_>) {
            signal.trail.push("absorber");
        }
    }

    impl Node for Absorber {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts_inner::<Ping>();
        }
    }

    struct Relay;

    impl Node for Relay {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.passes_up::<Ping>();
        }
    }

    /// A scope with no opinion about pings.
    struct Wall;

    impl Node for Wall {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(_: &mut Capabilities<Self>) {}
    }

    /// Leaf that provides pings and records tallies.
    #[derive(Default)]
    struct Leaf {
        name: &'static str,
        last: Option<Delivery>,
    }

    impl Leaf {
        fn named(name: &'static str) -> Self {
            Self { name, last: None }
        }
    }

    impl Accepts<Tally> for Leaf {
        fn on_signal(&mut self, signal: &mut Tally, cx: &mut Context<'_>) {
            signal.trail.push((self.name, signal.value));
            signal.value += 1;
            // Bounce a ping upward while the tally is still being delivered.
            self.last = Some(cx.send(&mut Ping::default()).unwrap());
        }
    }

    impl Node for Leaf {
        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts::<Tally>().provides::<Ping>();
        }
    }

    /// Multiplies tally values by `factor` for its subtree.
    struct Scale {
        factor: i32,
        pass: bool,
        filtered: u32,
        unfiltered: u32,
    }

    impl Scale {
        fn new(factor: i32) -> Self {
            Self {
                factor,
                pass: true,
                filtered: 0,
                unfiltered: 0,
            }
        }
    }

    impl FiltersDown<Tally> for Scale {
        fn filter_down(&mut self, signal: &mut Tally, _: &mut Context<'_>) -> bool {
            self.filtered += 1;
            signal.value *= self.factor;
            signal.trail.push(("filter", signal.value));
            self.pass
        }

        fn unfilter_down(&mut self, signal: &mut Tally, _: &mut Context<'_>) {
            self.unfiltered += 1;
            signal.value /= self.factor;
            signal.trail.push(("unfilter", signal.value));
        }
    }

    impl Accepts<Tally> for Scale {
        fn on_signal(&mut self, signal: &mut Tally, _: &mut Context<'_>) {
            signal.trail.push(("scale", signal.value));
        }
    }

    impl Node for Scale {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.filters_down::<Tally>().accepts::<Tally>();
        }
    }

    /// Sends pings inward and outward from its own handlers.
    #[derive(Default)]
    struct Echo {
        inner_result: Option<Result<()>>,
        up_result: Option<Result<Delivery>>,
    }

    impl Accepts<Ping> for Echo {
        fn on_signal(&mut self, signal: &mut Ping, cx: &mut Context<'_>) {
            signal.trail.push("echo");
            self.inner_result = Some(cx.send_inner(&mut Tally::default()));
            self.up_result = Some(cx.send(&mut Tally::default()));
        }
    }

    impl Node for Echo {
        const KIND: NodeKind = NodeKind::Scope;

        fn declare(caps: &mut Capabilities<Self>) {
            caps.accepts::<Ping>().provides_inner::<Tally>();
        }
    }

    #[test]
    fn upward_send_stops_at_first_acceptor() {
        let mut graph = Graph::new();
        let outer = graph.insert(None, Sink).unwrap();
        let inner = graph.insert(Some(outer), Sink).unwrap();
        let relay = graph.insert(Some(inner), Relay).unwrap();
        let leaf = graph.insert(Some(relay), Leaf::default()).unwrap();

        let mut ping = Ping::default();
        let delivery = graph.send(leaf, &mut ping).unwrap();
        assert_eq!(delivery, Delivery::Accepted(inner));
        assert_eq!(ping.trail, vec!["sink"], "exactly one terminal handler");
    }

    #[test]
    fn inner_acceptors_observe_and_relay() {
        let mut graph = Graph::new();
        let sink = graph.insert(None, Sink).unwrap();
        let listener = graph.insert(Some(sink), Listener).unwrap();
        let leaf = graph.insert(Some(listener), Leaf::default()).unwrap();

        let mut ping = Ping::default();
        assert_eq!(
            graph.send(leaf, &mut ping).unwrap(),
            Delivery::Accepted(sink)
        );
        assert_eq!(ping.trail, vec!["listener", "sink"]);
    }

    #[test]
    fn absorbed_is_distinct_from_dropped() {
        let mut graph = Graph::new();
        let sink = graph.insert(None, Sink).unwrap();
        let absorber = graph.insert(Some(sink), Absorber).unwrap();
        let wall = graph.insert(Some(sink), Wall).unwrap();
        let relay = graph.insert(None, Relay).unwrap();

        let a = graph.insert(Some(absorber), Leaf::default()).unwrap();
        let b = graph.insert(Some(wall), Leaf::default()).unwrap();
        let c = graph.insert(Some(relay), Leaf::default()).unwrap();

        let mut ping = Ping::default();
        assert_eq!(
            graph.send(a, &mut ping).unwrap(),
            Delivery::Absorbed(absorber)
        );
        assert_eq!(ping.trail, vec!["absorber"]);

        let mut ping = Ping::default();
        assert_eq!(graph.send(b, &mut ping).unwrap(), Delivery::Dropped);
        assert!(ping.trail.is_empty(), "a wall blocks the sink behind it");

        let mut ping = Ping::default();
        assert_eq!(graph.send(c, &mut ping).unwrap(), Delivery::Dropped);
        assert!(ping.trail.is_empty());
    }

    #[test]
    fn send_from_stale_node_fails() {
        let mut graph = Graph::new();
        let leaf = graph.insert(None, Leaf::default()).unwrap();
        graph.remove(leaf);
        assert_eq!(
            graph.send(leaf, &mut Ping::default()),
            Err(Error::StaleNode(leaf))
        );
        assert_eq!(
            graph.send_down(leaf, &mut Tally::default()),
            Err(Error::StaleNode(leaf))
        );
    }

    #[test]
    fn filter_wraps_children_exactly_once() {
        let mut graph = Graph::new();
        let scale = graph.insert(None, Scale::new(10)).unwrap();
        graph.insert(Some(scale), Leaf::named("a")).unwrap();
        graph.insert(Some(scale), Leaf::named("b")).unwrap();

        let mut tally = Tally {
            value: 2,
            ..Tally::default()
        };
        graph.send_down(scale, &mut tally).unwrap();

        // Children see the filtered value in insertion order; the unfilter sees
        // their mutations; the scope's own handler sees outer coordinates.
        assert_eq!(
            tally.trail,
            vec![
                ("filter", 20),
                ("a", 20),
                ("b", 21),
                ("unfilter", 2),
                ("scale", 2),
            ]
        );
        let scale = graph.get::<Scale>(scale).unwrap();
        assert_eq!((scale.filtered, scale.unfiltered), (1, 1));
    }

    #[test]
    fn nested_filters_compose() {
        let mut graph = Graph::new();
        let outer = graph.insert(None, Scale::new(2)).unwrap();
        let inner = graph.insert(Some(outer), Scale::new(3)).unwrap();
        graph.insert(Some(inner), Leaf::named("leaf")).unwrap();

        let mut tally = Tally {
            value: 1,
            ..Tally::default()
        };
        graph.send_down(outer, &mut tally).unwrap();
        assert!(tally.trail.contains(&("leaf", 6)));
        assert_eq!(tally.value, 1);
    }

    #[test]
    fn short_circuit_skips_unfilter_by_default() {
        let mut graph = Graph::new();
        let mut gate = Scale::new(1);
        gate.pass = false;
        let gate = graph.insert(None, gate).unwrap();
        graph.insert(Some(gate), Leaf::named("hidden")).unwrap();

        let mut tally = Tally::default();
        graph.send_down(gate, &mut tally).unwrap();
        assert_eq!(tally.trail, vec![("filter", 0)]);
        let gate = graph.get::<Scale>(gate).unwrap();
        assert_eq!((gate.filtered, gate.unfiltered), (1, 0));
    }

    #[test]
    fn short_circuit_can_always_unfilter() {
        let mut graph = Graph::with_short_circuit(ShortCircuit::AlwaysUnfilter);
        let mut gate = Scale::new(1);
        gate.pass = false;
        let gate = graph.insert(None, gate).unwrap();
        graph.insert(Some(gate), Leaf::named("hidden")).unwrap();

        let mut tally = Tally::default();
        graph.send_down(gate, &mut tally).unwrap();
        assert_eq!(tally.trail, vec![("filter", 0), ("unfilter", 0)]);
        let gate = graph.get::<Scale>(gate).unwrap();
        assert_eq!((gate.filtered, gate.unfiltered), (1, 1));
    }

    #[test]
    fn derived_signals_reach_base_handlers() {
        let mut graph = Graph::new();
        let scale = graph.insert(None, Scale::new(5)).unwrap();
        graph.insert(Some(scale), Leaf::named("leaf")).unwrap();

        let mut deep = DeepTally::default();
        deep.value = 1;
        graph.send_down(scale, &mut deep).unwrap();
        assert_eq!(deep.trail[1], ("leaf", 5));
        assert_eq!(deep.value, 1);
    }

    #[test]
    fn handlers_may_send_while_delivering() {
        let mut graph = Graph::new();
        let sink = graph.insert(None, Sink).unwrap();
        let scale = graph.insert(Some(sink), Scale::new(1)).unwrap();
        let leaf = graph.insert(Some(scale), Leaf::named("leaf")).unwrap();

        graph.send_down(scale, &mut Tally::default()).unwrap();
        // Scale does not pass pings up: the bounced ping is dropped there.
        assert_eq!(graph.get::<Leaf>(leaf).unwrap().last, Some(Delivery::Dropped));

        let relay = graph.insert(Some(sink), Relay).unwrap();
        let other = graph.insert(Some(relay), Leaf::named("other")).unwrap();
        graph.send_down(relay, &mut Tally::default()).unwrap();
        assert_eq!(
            graph.get::<Leaf>(other).unwrap().last,
            Some(Delivery::Accepted(sink))
        );
    }

    #[test]
    fn busy_nodes_are_not_reentered() {
        let mut graph = Graph::new();
        let echo = graph.insert(None, Echo::default()).unwrap();
        let leaf = graph.insert(Some(echo), Leaf::named("leaf")).unwrap();

        // The leaf's ping bounces back to `echo` while echo is still handling
        // the first ping.
        let mut ping = Ping::default();
        let source = graph.insert(Some(echo), Leaf::named("source")).unwrap();
        assert_eq!(graph.send(source, &mut ping).unwrap(), Delivery::Accepted(echo));
        assert_eq!(ping.trail, vec!["echo"]);
        assert_eq!(graph.get::<Leaf>(leaf).unwrap().last, Some(Delivery::Busy(echo)));

        let echo = graph.get::<Echo>(echo).unwrap();
        assert_eq!(echo.inner_result, Some(Ok(())));
        assert!(
            matches!(
                echo.up_result,
                Some(Err(Error::Undeclared {
                    relation: Relation::Provides,
                    ..
                }))
            ),
            "echo never declared that it provides tallies upward"
        );
    }

    #[test]
    fn self_removal_inside_handler_is_safe() {
        struct Quitter;

        impl Accepts<Tally> for Quitter {
            fn on_signal(&mut self, _: &mut Tally, cx: &mut Context<'_>) {
                let me = cx.id();
                cx.remove(me);
            }
        }

        impl Node for Quitter {
            fn declare(caps: &mut Capabilities<Self>) {
                caps.accepts::<Tally>();
            }
        }

        let mut graph = Graph::new();
        let root = graph.insert(None, Wall).unwrap();
        let quitter = graph.insert(Some(root), Quitter).unwrap();
        graph.insert(Some(root), Leaf::named("after")).unwrap();

        let mut tally = Tally::default();
        graph.send_down(root, &mut tally).unwrap();
        assert!(!graph.is_alive(quitter));
        assert_eq!(tally.trail, vec![("after", 0)]);
        assert_eq!(graph.children_of(root).len(), 1);
    }
}
