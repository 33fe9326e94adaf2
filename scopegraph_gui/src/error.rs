// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::backend::BackendError;

/// Errors surfaced by a [`Window`](crate::Window).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The rendering backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The signal tree rejected an operation.
    #[error(transparent)]
    Graph(#[from] scopegraph::Error),
}
