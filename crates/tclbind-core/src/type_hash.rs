//! Deterministic hash-based type tags.
//!
//! Every registered native type carries a [`TypeHash`] computed from its
//! runtime-visible name. The tag is what a value cell stores to say "this
//! cell holds a native `Point`", and what extraction compares against.
//!
//! ```
//! use tclbind_core::TypeHash;
//!
//! let a = TypeHash::from_name("Point");
//! let b = TypeHash::from_name("Point");
//! assert_eq!(a, b);
//! assert_ne!(a, TypeHash::from_name("Line"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain marker mixed into native type tags.
const TYPE_DOMAIN: u64 = 0x2fac10b63a6cc57c;

/// A deterministic 64-bit tag identifying a registered native type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Tag for a type registered under `name`.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(TYPE_DOMAIN ^ xxh64(name.as_bytes(), 0))
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
