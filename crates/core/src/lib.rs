//! Shared primitives for all Grantline crates.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type used across Grantline crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

macro_rules! uuid_identifier {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of an authenticated principal.
    PrincipalId
);
uuid_identifier!(
    /// Identifier of an organization (tenant boundary).
    OrganizationId
);
uuid_identifier!(
    /// Identifier of an organization-scoped role.
    RoleId
);

impl PrincipalId {
    /// Validates the identifier before any storage access.
    ///
    /// The nil UUID is the one value session plumbing can hand over for an
    /// unauthenticated or half-constructed context, so it is rejected here
    /// rather than deep inside a query.
    pub fn validated(self) -> AppResult<Self> {
        if self.0.is_nil() {
            return Err(AppError::Validation(
                "principal id must not be the nil uuid".to_owned(),
            ));
        }

        Ok(self)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant, rejected before any I/O.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backing store unreachable or timed out.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// The optimized batched facet retrieval is structurally absent.
    #[error("aggregation unsupported: {0}")]
    AggregationUnsupported(String),

    /// Principal is authenticated but lacks a required capability.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether this error indicates the batched path is absent
    /// rather than a transient storage fault.
    #[must_use]
    pub fn is_aggregation_unsupported(&self) -> bool {
        matches!(self, Self::AggregationUnsupported(_))
    }
}
