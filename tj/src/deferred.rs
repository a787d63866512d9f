//! Deferred identifier placeholder
//!
//! A field can hold a [`DeferredUuid`] until something asks for the real
//! identifier. Resolution is explicit: [`crate::Document::resolve`] calls the
//! factory and swaps the placeholder for the generated UUID. Comparing or
//! formatting a placeholder never triggers generation.

use std::fmt;

use crate::scalar::Uuid;

/// Produces a UUID, or `None` if one cannot be generated yet
pub type IdFactory = fn() -> Option<uuid::Uuid>;

/// Factory producing a fresh random UUID
pub fn random_uuid() -> Option<uuid::Uuid> {
    Some(uuid::Uuid::new_v4())
}

/// A UUID that has not been generated yet
#[derive(Clone, Copy)]
pub struct DeferredUuid {
    factory: IdFactory,
}

impl DeferredUuid {
    pub fn new(factory: IdFactory) -> Self {
        Self { factory }
    }

    /// Run the factory; `None` means the placeholder must stay unresolved
    pub fn resolve(&self) -> Option<Uuid> {
        (self.factory)().map(Uuid::from)
    }
}

impl fmt::Debug for DeferredUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeferredUuid(<unresolved>)")
    }
}

// Two unresolved placeholders never denote the same identifier.
impl PartialEq for DeferredUuid {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}
