//! Typed channel declarations.

use std::fmt;
use std::marker::PhantomData;

/// A named request/response contract between the two endpoints.
///
/// A channel holds nothing but its name; `Req` and `Resp` fix the types
/// both sides serialize for it. Channels are declared as `const` items
/// (see [`crate::api`]) and live for the whole process.
pub struct Channel<Req, Resp> {
    /// Name used to address the channel on the wire.
    name: &'static str,
    /// Binds the request and response types without owning either.
    types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> Channel<Req, Resp> {
    /// Declares a channel addressed by `name`.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            types: PhantomData,
        }
    }

    /// Returns the channel's wire name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<Req, Resp> Clone for Channel<Req, Resp> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Req, Resp> Copy for Channel<Req, Resp> {}

impl<Req, Resp> fmt::Debug for Channel<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Channel").field(&self.name).finish()
    }
}

/// Returns `true` when no two entries of `names` are equal.
///
/// Usable in `const` context so duplicate declarations fail the build.
pub(crate) const fn names_unique(names: &[&str]) -> bool {
    let mut i = 0;
    while i < names.len() {
        let mut j = i + 1;
        while j < names.len() {
            if str_eq(names[i], names[j]) {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

/// `const` string equality.
const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}
