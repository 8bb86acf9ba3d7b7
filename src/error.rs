// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Error type for mapping-plan compilation and configuration.
///
/// These errors are fatal to the compile attempt that raised them only; they
/// surface synchronously to whoever first triggers the compile and are not
/// retried until the configuration is corrected.
#[derive(Debug, Clone, Error)]
pub enum PlanCompileError {
    /// No usable constructor and no configured factory for the target shape.
    #[error("no way to construct '{target}' when mapping {src_ty} -> {target} ({rule_set}): no usable constructor or configured factory")]
    NotConstructable {
        src_ty: String,
        target: String,
        rule_set: String,
    },

    /// A configured factory duplicates what the default construction strategy
    /// already produces.
    #[error("the configured factory for '{target}' will automatically be used to create instances and does not need to be configured")]
    RedundantFactory { target: String },

    /// A plan compilation re-entered itself through the cache.
    #[error("plan compilation for '{key}' re-entered itself")]
    RecursivePlanCompilation { key: String },

    /// A type reference named a shape that is not registered.
    #[error("unknown shape '{0}'")]
    UnknownShape(String),

    /// A configured member path named a member the shape does not have.
    #[error("shape '{shape}' has no member '{member}'")]
    UnknownMember { shape: String, member: String },

    /// A shape with the same name is already registered.
    #[error("a shape named '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Shape names must be non-empty and not whitespace-only.
    #[error("'{0}' is not a valid shape name")]
    InvalidShapeName(String),
}
