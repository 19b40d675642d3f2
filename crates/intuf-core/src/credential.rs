//! # Scoped Bearer Credentials
//!
//! The repository's target API hands out tokens scoped to exactly one
//! capability. `BearerToken<S>` carries its scope in the type, so a
//! [`WriteCredential`] can only reach the publish call and a
//! [`DeleteCredential`] only the retract call.
//!
//! Token material lives in `Zeroizing<String>` and is redacted from `Debug`.

use std::fmt;
use std::marker::PhantomData;

use zeroize::Zeroizing;

use crate::error::CredentialError;

mod sealed {
    pub trait Sealed {}
}

/// Capability a bearer token is scoped to.
pub trait CredentialScope: sealed::Sealed {
    /// Scope name used in messages.
    const NAME: &'static str;
}

/// Scope for adding targets to the index.
#[derive(Debug)]
pub enum WriteScope {}

/// Scope for removing targets from the index.
#[derive(Debug)]
pub enum DeleteScope {}

impl sealed::Sealed for WriteScope {}
impl sealed::Sealed for DeleteScope {}

impl CredentialScope for WriteScope {
    const NAME: &'static str = "write";
}

impl CredentialScope for DeleteScope {
    const NAME: &'static str = "delete";
}

/// A bearer token bound to one scope.
pub struct BearerToken<S: CredentialScope> {
    token: Zeroizing<String>,
    scope: PhantomData<S>,
}

/// Token authorized to publish targets.
pub type WriteCredential = BearerToken<WriteScope>;

/// Token authorized to retract targets.
pub type DeleteCredential = BearerToken<DeleteScope>;

impl<S: CredentialScope> BearerToken<S> {
    /// Wrap a raw token. Surrounding whitespace is trimmed.
    pub fn new(token: impl Into<String>) -> Result<Self, CredentialError> {
        let raw = Zeroizing::new(token.into());
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::Empty { scope: S::NAME });
        }
        if !trimmed.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(CredentialError::InvalidCharacters { scope: S::NAME });
        }
        Ok(Self {
            token: Zeroizing::new(trimmed.to_string()),
            scope: PhantomData,
        })
    }

    /// The scope name (`"write"` or `"delete"`).
    pub fn scope(&self) -> &'static str {
        S::NAME
    }

    /// The raw token, for building an `Authorization` header.
    pub fn expose(&self) -> &str {
        self.token.as_str()
    }
}

impl<S: CredentialScope> Clone for BearerToken<S> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            scope: PhantomData,
        }
    }
}

impl<S: CredentialScope> fmt::Debug for BearerToken<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("scope", &S::NAME)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
