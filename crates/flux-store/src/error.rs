/// Errors returned by a [`Store`](crate::Store).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key holds a different kind of value than the operation expects.
    #[error("key `{key}` holds a {found}, expected a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// `incr` was applied to a value that is not an integer.
    #[error("value at `{0}` is not an integer")]
    NotAnInteger(String),

    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
