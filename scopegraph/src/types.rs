// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the graph: node identifiers, node kinds, and dispatch outcomes.

/// Identifier for a node in the graph (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The two flavors of node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum NodeKind {
    /// Leaf node: accepts and provides signals, never owns children.
    #[default]
    Agent,
    /// Interior node: owns children and may relay or filter signals for them.
    Scope,
}

/// Where an upward [`send`](crate::Graph::send) ended.
///
/// Distinguishes a signal nobody wanted from one that was consumed, so tests
/// and callers can tell "dropped" apart from "accepted but declined".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// An ancestor's `Accepts` handler ran; propagation stopped there.
    Accepted(NodeId),
    /// An ancestor's `AcceptsInner` handler ran and the ancestor does not pass the signal up.
    Absorbed(NodeId),
    /// The receiving ancestor was already running one of its handlers.
    Busy(NodeId),
    /// No ancestor accepted the signal.
    Dropped,
}

impl Delivery {
    /// The node whose handler consumed the signal, if any.
    pub fn receiver(self) -> Option<NodeId> {
        match self {
            Self::Accepted(id) | Self::Absorbed(id) => Some(id),
            Self::Busy(_) | Self::Dropped => None,
        }
    }
}

/// What happens to `unfilter_down` when `filter_down` stops propagation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ShortCircuit {
    /// A filter that returned `false` has fully handled the signal; `unfilter_down` is not called.
    #[default]
    SkipUnfilter,
    /// `unfilter_down` is called after every `filter_down`, whatever it returned.
    AlwaysUnfilter,
}
