// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capability declarations: what a node accepts, provides, relays, and filters.
//!
//! A node type lists its capabilities once, in [`Node::declare`]. Relations
//! that carry behavior are typed: [`Capabilities::accepts`] only compiles when
//! the node implements [`Accepts`] for that signal, and likewise for
//! [`AcceptsInner`] and [`FiltersDown`]. The remaining relations
//! ([`Capabilities::provides`], [`Capabilities::provides_inner`],
//! [`Capabilities::passes_up`]) are pure declarations, used for routing and by
//! [`Graph::validate`](crate::Graph::validate).
//!
//! Declaring a base category covers every derived signal: a scope that
//! declares `filters_down::<DrawBase>()` intercepts `DrawOpaque` and
//! `DrawTranslucent` alike, and its handler sees the embedded `DrawBase`.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::dispatch::Context;
use crate::signal::{Lineage, Signal, SignalKey, lineage_of};
use crate::types::NodeKind;

/// Terminal handler for a signal arriving at this node.
///
/// Runs when an upward send reaches the node, or when a downward delivery
/// visits it (after its children, so a scope observes their results).
pub trait Accepts<S: Signal> {
    /// Handle `signal`.
    fn on_signal(&mut self, signal: &mut S, cx: &mut Context<'_>);
}

/// Handler for a signal sent upward by a node in this scope's subtree.
pub trait AcceptsInner<S: Signal> {
    /// Handle `signal` on its way up from the subtree.
    fn on_inner_signal(&mut self, signal: &mut S, cx: &mut Context<'_>);
}

/// Two-phase interception of a signal travelling down through this scope.
pub trait FiltersDown<S: Signal> {
    /// Transform `signal` before the children see it.
    ///
    /// Return `false` to stop propagation below this node.
    fn filter_down(&mut self, signal: &mut S, cx: &mut Context<'_>) -> bool;

    /// Reverse the transformation after the children are done.
    fn unfilter_down(&mut self, signal: &mut S, cx: &mut Context<'_>) {
        let _ = (signal, cx);
    }
}

/// A type that can live in a [`Graph`](crate::Graph).
pub trait Node: Any {
    /// Whether this node may own children.
    const KIND: NodeKind = NodeKind::Agent;

    /// Declare the capabilities of this node type.
    fn declare(caps: &mut Capabilities<Self>)
    where
        Self: Sized;
}

/// The six capability relations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Terminal handling.
    Accepts,
    /// Legitimate origin of upward sends.
    Provides,
    /// Receives upward sends from its own subtree.
    AcceptsInner,
    /// Delivers into its own subtree.
    ProvidesInner,
    /// Relays upward sends to its own parent.
    PassesUp,
    /// Intercepts downward delivery.
    FiltersDown,
}

impl Relation {
    /// Whether only scopes may declare this relation.
    pub fn scope_only(self) -> bool {
        matches!(
            self,
            Self::AcceptsInner | Self::ProvidesInner | Self::PassesUp | Self::FiltersDown
        )
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accepts => "Accepts",
            Self::Provides => "Provides",
            Self::AcceptsInner => "AcceptsInner",
            Self::ProvidesInner => "ProvidesInner",
            Self::PassesUp => "PassesUp",
            Self::FiltersDown => "FiltersDown",
        })
    }
}

/// Untyped capability sets of a node, used for routing and validation.
#[derive(Clone, Debug, Default)]
pub struct CapabilitySet {
    accepts: SmallVec<[SignalKey; 4]>,
    accepts_inner: SmallVec<[SignalKey; 4]>,
    passes_up: SmallVec<[SignalKey; 4]>,
    filters_down: SmallVec<[SignalKey; 4]>,
    provides: Vec<Lineage>,
    provides_inner: Vec<Lineage>,
}

impl CapabilitySet {
    fn keys(&self, relation: Relation) -> &[SignalKey] {
        match relation {
            Relation::Accepts => &self.accepts,
            Relation::AcceptsInner => &self.accepts_inner,
            Relation::PassesUp => &self.passes_up,
            Relation::FiltersDown => &self.filters_down,
            Relation::Provides | Relation::ProvidesInner => &[],
        }
    }

    /// The first category of `lineage` this node declares under `relation`.
    ///
    /// Categories are tried most specific first, so a handler for the exact
    /// signal type wins over a handler for one of its bases.
    pub fn find(&self, relation: Relation, lineage: &Lineage) -> Option<SignalKey> {
        match relation {
            Relation::Provides => Self::find_provided(&self.provides, lineage),
            Relation::ProvidesInner => Self::find_provided(&self.provides_inner, lineage),
            _ => {
                let keys = self.keys(relation);
                lineage.iter().copied().find(|key| keys.contains(key))
            }
        }
    }

    fn find_provided(provided: &[Lineage], lineage: &Lineage) -> Option<SignalKey> {
        provided
            .iter()
            .filter_map(|p| p.first().copied())
            .find(|key| lineage.contains(key))
    }

    /// Whether `relation` is declared for some category of `lineage`.
    pub fn declares(&self, relation: Relation, lineage: &Lineage) -> bool {
        self.find(relation, lineage).is_some()
    }

    /// Lineages of the signals this node provides upward.
    pub fn provided(&self) -> &[Lineage] {
        &self.provides
    }

    /// Lineages of the signals this node provides into its subtree.
    pub fn provided_inner(&self) -> &[Lineage] {
        &self.provides_inner
    }

    /// The first scope-only declaration, if any.
    pub(crate) fn first_scope_only(&self) -> Option<(Relation, SignalKey)> {
        [
            Relation::AcceptsInner,
            Relation::PassesUp,
            Relation::FiltersDown,
        ]
        .into_iter()
        .find_map(|r| self.keys(r).first().map(|k| (r, *k)))
        .or_else(|| {
            self.provides_inner
                .first()
                .and_then(|l| l.first())
                .map(|k| (Relation::ProvidesInner, *k))
        })
    }

    fn insert_key(keys: &mut SmallVec<[SignalKey; 4]>, key: SignalKey) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
}

pub(crate) type Handler<N> = fn(&mut N, &mut dyn Any, &mut Context<'_>);
pub(crate) type Filter<N> = fn(&mut N, &mut dyn Any, &mut Context<'_>) -> bool;

fn call_accept<N: Accepts<S>, S: Signal>(node: &mut N, signal: &mut dyn Any, cx: &mut Context<'_>) {
    if let Some(signal) = signal.downcast_mut::<S>() {
        node.on_signal(signal, cx);
    }
}

fn call_accept_inner<N: AcceptsInner<S>, S: Signal>(
    node: &mut N,
    signal: &mut dyn Any,
    cx: &mut Context<'_>,
) {
    if let Some(signal) = signal.downcast_mut::<S>() {
        node.on_inner_signal(signal, cx);
    }
}

fn call_filter<N: FiltersDown<S>, S: Signal>(
    node: &mut N,
    signal: &mut dyn Any,
    cx: &mut Context<'_>,
) -> bool {
    match signal.downcast_mut::<S>() {
        Some(signal) => node.filter_down(signal, cx),
        None => true,
    }
}

fn call_unfilter<N: FiltersDown<S>, S: Signal>(
    node: &mut N,
    signal: &mut dyn Any,
    cx: &mut Context<'_>,
) {
    if let Some(signal) = signal.downcast_mut::<S>() {
        node.unfilter_down(signal, cx);
    }
}

/// Typed capability builder handed to [`Node::declare`].
///
/// ```
/// use scopegraph::{Accepts, Capabilities, Context, Node, signal};
///
/// #[derive(Debug, Default)]
/// struct Ping;
/// signal!(Ping);
///
/// struct Counter(u32);
///
/// impl Accepts<Ping> for Counter {
///     fn on_signal(&mut self, _: &mut Ping, _: &mut Context<'_>) {
///         self.0 += 1;
///     }
/// }
///
/// impl Node for Counter {
///     fn declare(caps: &mut Capabilities<Self>) {
///         caps.accepts::<Ping>();
///     }
/// }
/// ```
pub struct Capabilities<N> {
    set: CapabilitySet,
    accepts: HashMap<TypeId, Handler<N>>,
    accepts_inner: HashMap<TypeId, Handler<N>>,
    filters: HashMap<TypeId, (Filter<N>, Handler<N>)>,
}

impl<N> fmt::Debug for Capabilities<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("set", &self.set)
            .finish_non_exhaustive()
    }
}

impl<N: Node> Capabilities<N> {
    pub(crate) fn collect() -> Self {
        let mut caps = Self {
            set: CapabilitySet::default(),
            accepts: HashMap::new(),
            accepts_inner: HashMap::new(),
            filters: HashMap::new(),
        };
        N::declare(&mut caps);
        caps
    }

    /// Declare a terminal handler for `S`.
    pub fn accepts<S: Signal>(&mut self) -> &mut Self
    where
        N: Accepts<S>,
    {
        let key = SignalKey::of::<S>();
        CapabilitySet::insert_key(&mut self.set.accepts, key);
        self.accepts.insert(key.id(), call_accept::<N, S>);
        self
    }

    /// Declare a handler for `S` sent up from this node's subtree.
    pub fn accepts_inner<S: Signal>(&mut self) -> &mut Self
    where
        N: AcceptsInner<S>,
    {
        let key = SignalKey::of::<S>();
        CapabilitySet::insert_key(&mut self.set.accepts_inner, key);
        self.accepts_inner
            .insert(key.id(), call_accept_inner::<N, S>);
        self
    }

    /// Declare a downward filter for `S`.
    pub fn filters_down<S: Signal>(&mut self) -> &mut Self
    where
        N: FiltersDown<S>,
    {
        let key = SignalKey::of::<S>();
        CapabilitySet::insert_key(&mut self.set.filters_down, key);
        self.filters
            .insert(key.id(), (call_filter::<N, S>, call_unfilter::<N, S>));
        self
    }

    /// Declare that this node sends `S` upward.
    pub fn provides<S: Signal>(&mut self) -> &mut Self {
        let lineage = lineage_of::<S>();
        if !self.set.provides.contains(&lineage) {
            self.set.provides.push(lineage);
        }
        self
    }

    /// Declare that this node sends `S` into its subtree.
    pub fn provides_inner<S: Signal>(&mut self) -> &mut Self {
        let lineage = lineage_of::<S>();
        if !self.set.provides_inner.contains(&lineage) {
            self.set.provides_inner.push(lineage);
        }
        self
    }

    /// Declare that upward sends of `S` from the subtree continue past this node.
    pub fn passes_up<S: Signal>(&mut self) -> &mut Self {
        CapabilitySet::insert_key(&mut self.set.passes_up, SignalKey::of::<S>());
        self
    }

    pub(crate) fn split(self) -> (CapabilitySet, Handlers<N>) {
        (
            self.set,
            Handlers {
                accepts: self.accepts,
                accepts_inner: self.accepts_inner,
                filters: self.filters,
            },
        )
    }
}

/// Handler tables of one node type.
pub(crate) struct Handlers<N> {
    accepts: HashMap<TypeId, Handler<N>>,
    accepts_inner: HashMap<TypeId, Handler<N>>,
    filters: HashMap<TypeId, (Filter<N>, Handler<N>)>,
}

/// Which handler of a node to invoke.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Hook {
    Accept,
    AcceptInner,
    Filter,
    Unfilter,
}

/// Type-erased node stored in the graph.
pub(crate) trait ErasedNode: Any {
    /// Run the handler `hook` registered for `ty`.
    ///
    /// Returns `None` if no such handler exists, otherwise the filter decision
    /// (`true` for non-filter hooks).
    fn invoke(
        &mut self,
        hook: Hook,
        ty: TypeId,
        signal: &mut dyn Any,
        cx: &mut Context<'_>,
    ) -> Option<bool>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct Slot<N> {
    pub(crate) node: N,
    handlers: Handlers<N>,
}

impl<N: Node> Slot<N> {
    pub(crate) fn boxed(node: N, handlers: Handlers<N>) -> Box<dyn ErasedNode> {
        Box::new(Self { node, handlers })
    }
}

impl<N: Node> ErasedNode for Slot<N> {
    fn invoke(
        &mut self,
        hook: Hook,
        ty: TypeId,
        signal: &mut dyn Any,
        cx: &mut Context<'_>,
    ) -> Option<bool> {
        let node = &mut self.node;
        match hook {
            Hook::Accept => self.handlers.accepts.get(&ty).map(|h| {
                h(node, signal, cx);
                true
            }),
            Hook::AcceptInner => self.handlers.accepts_inner.get(&ty).map(|h| {
                h(node, signal, cx);
                true
            }),
            Hook::Filter => self
                .handlers
                .filters
                .get(&ty)
                .map(|(filter, _)| filter(node, signal, cx)),
            Hook::Unfilter => self.handlers.filters.get(&ty).map(|(_, unfilter)| {
                unfilter(node, signal, cx);
                true
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
