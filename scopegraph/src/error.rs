// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration and structural errors.

use crate::capability::Relation;
use crate::types::NodeId;

/// Errors raised while building or dispatching through a [`Graph`](crate::Graph).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The identifier does not refer to a live node.
    #[error("node {0:?} is stale or was removed")]
    StaleNode(NodeId),
    /// Children can only be attached to scopes.
    #[error("node `{name}` ({id:?}) is an agent and cannot own children")]
    NotAScope {
        /// The would-be parent.
        id: NodeId,
        /// Type name of the would-be parent.
        name: &'static str,
    },
    /// An agent declared a relation only scopes may have.
    #[error("agent `{node}` declares `{relation}` for `{signal}`, which only scopes may do")]
    AgentCapability {
        /// Type name of the agent.
        node: &'static str,
        /// The offending relation.
        relation: Relation,
        /// Type name of the signal.
        signal: &'static str,
    },
    /// Reparenting would make a node its own ancestor.
    #[error("moving {0:?} below its own subtree would create a cycle")]
    Cycle(NodeId),
    /// A node sent a signal it never declared.
    #[error("`{node}` sends `{signal}` without declaring `{relation}`")]
    Undeclared {
        /// Type name of the sender.
        node: &'static str,
        /// The missing relation.
        relation: Relation,
        /// Type name of the signal.
        signal: &'static str,
    },
    /// A provided signal has no acceptor on the path to the root.
    #[error("`{node}` provides `{signal}` but no ancestor accepts or absorbs it")]
    NoAcceptor {
        /// The providing node.
        id: NodeId,
        /// Type name of the providing node.
        node: &'static str,
        /// Type name of the signal.
        signal: &'static str,
    },
    /// A scope provides a signal inward but no child can receive it.
    #[error("`{node}` provides `{signal}` inward but no child accepts, filters, or relays it")]
    NoInnerAcceptor {
        /// The providing scope.
        id: NodeId,
        /// Type name of the providing scope.
        node: &'static str,
        /// Type name of the signal.
        signal: &'static str,
    },
}

/// Result alias for graph operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;
