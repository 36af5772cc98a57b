use thiserror::Error;

/// Closed error taxonomy shared by every crate in the workspace.
///
/// Deliberately data-less: the merge rule in [`merge`] needs a flat, `Copy` enum, and
/// callers that need more context attach it via `tracing` fields at the call site rather
/// than threading it through the error value itself.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Error {
    #[default]
    #[error("ok")]
    Ok,
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid state")]
    InvalidState,
    #[error("out of range")]
    OutOfRange,
    #[error("not found")]
    NotFound,
    #[error("platform dependent error")]
    PlatformDependent,
    #[error("invalid data")]
    InvalidData,
    #[error("limit exceeded")]
    LimitExceeded,
    #[error("timeout")]
    Timeout,
    #[error("not implemented")]
    NotImplemented,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("access denied")]
    AccessDenied,
    #[error("disconnected")]
    Disconnected,
}

impl Error {
    pub fn is_ok(self) -> bool {
        matches!(self, Error::Ok)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// `a` if `a != Ok`, else `b` — the older error wins so teardown failures never mask
/// the root cause that triggered the teardown in the first place.
pub fn merge(a: Error, b: Error) -> Error {
    if a.is_ok() { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_first_error() {
        assert_eq!(merge(Error::InvalidArgument, Error::OutOfMemory), Error::InvalidArgument);
        assert_eq!(merge(Error::Ok, Error::OutOfMemory), Error::OutOfMemory);
        assert_eq!(merge(Error::Ok, Error::Ok), Error::Ok);
    }
}
