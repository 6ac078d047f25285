// SPDX-License-Identifier: MIT

//! Shared error-kind vocabulary.
//!
//! Each component crate defines its own `thiserror` error enum scoped to the
//! abstract kinds that actually apply to it (the runner never returns
//! `Conflict`, the queue store never returns `StartFailed`). This module
//! holds only the small amount of vocabulary genuinely shared across crate
//! boundaries: the kind tag used for log fields and cross-crate matching.

/// Abstract error kind, independent of which crate raised the concrete error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    Empty,
    Conflict,
    Transient,
    RateLimit,
    Fatal,
}

crate::simple_display! {
    ErrorKind {
        Validation => "validation",
        NotFound => "not_found",
        AlreadyExists => "already_exists",
        Empty => "empty",
        Conflict => "conflict",
        Transient => "transient",
        RateLimit => "rate_limit",
        Fatal => "fatal",
    }
}

/// Implemented by each crate's own error enum so callers can branch on the
/// abstract kind without matching concrete variants from a crate they don't
/// otherwise depend on.
pub trait ClassifiedError {
    fn kind(&self) -> ErrorKind;

    /// Whether the scheduler/runner should treat this as a control signal
    /// (e.g. `Empty` on dequeue) rather than a failure to log.
    fn is_control_signal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Empty)
    }
}
