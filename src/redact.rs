//! Secret redaction for logs, error messages and serialized output.
//!
//! The signing key is held as [`Redacted`] from the moment it is read from the
//! environment. Code that needs the raw value calls [`Redacted::expose`].

use std::fmt::{self, Debug, Display};

/// Wrapper that prints and serializes as `<redacted>`
///
/// ```ignore
/// use forwarder::redact::Redacted;
///
/// let key = Redacted::new("0xac09...".to_string());
/// tracing::info!(private_key = %key, "Loaded signer");
/// // Logs: private_key = <redacted>
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the secret value
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}
