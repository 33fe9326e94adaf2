// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=scopegraph --heading-base-level=0

//! Scopegraph: typed, hierarchical signal dispatch for UI trees.
//!
//! ## Overview
//!
//! A [`Graph`] holds two kinds of node: *agents* (leaves) and *scopes*
//! (interior nodes that own children). Every node type declares, once, how it
//! relates to each [`Signal`] type it deals with:
//!
//! - [`Accepts`]: terminal handling of a signal arriving at the node.
//! - `Provides`: the node sends the signal upward.
//! - [`AcceptsInner`] / `ProvidesInner`: the same two contracts toward the
//!   node's own subtree.
//! - `PassesUp`: upward sends from the subtree continue past the node.
//! - [`FiltersDown`]: the node transforms a signal on its way down and reverses
//!   the transformation after the subtree has handled it.
//!
//! Declarations are made in [`Node::declare`] through a typed [`Capabilities`]
//! builder, so a node cannot claim to accept a signal it has no handler for.
//! Agents declaring scope-only relations are rejected at insertion, and
//! [`Graph::validate`] checks at startup that every provided signal has an
//! acceptor on its path to the root.
//!
//! ## Signals
//!
//! Signal types are plain values. Categories ("a `MouseDown` is a
//! `PointerSignal`") are expressed by embedding the base as a field and
//! declaring the relation with [`signal!`]. A handler declared for a category
//! receives every signal of that category.
//!
//! ## Dispatch
//!
//! - [`Graph::send`] travels from a node toward the root and ends at the first
//!   acceptor. It reports a [`Delivery`] that tells an accepted signal apart
//!   from a dropped one.
//! - [`Graph::send_down`] visits a subtree. Filters wrap their children:
//!   filter, children in insertion order, unfilter, then the scope's own
//!   handler. The [`ShortCircuit`] policy pins down what happens when a filter
//!   stops propagation.
//! - Handlers receive a [`Context`] through which they can send further
//!   signals, reentrantly, and edit the graph.
//!
//! See the [`dispatch`] module docs for the exact rules.
//!
//! ## Threading
//!
//! Dispatch is synchronous and single threaded. Every call returns only after
//! the whole traversal completed; nothing is queued.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod capability;
pub mod dispatch;
mod error;
mod graph;
mod signal;
mod types;

pub use capability::{
    Accepts, AcceptsInner, Capabilities, CapabilitySet, FiltersDown, Node, Relation,
};
pub use dispatch::Context;
pub use error::{Error, Result};
pub use graph::Graph;
pub use signal::{AgentAdded, Lineage, Signal, SignalKey, lineage_of};
pub use types::{Delivery, NodeId, NodeKind, ShortCircuit};
