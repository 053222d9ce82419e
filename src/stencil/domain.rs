//! Placeholders and the domain binding them to storages.
//!
//! A [`Domain`] is built once from an ordered list of `(Placeholder, Storage)`
//! pairs and owns the storages for its whole lifetime. Bindings cannot change
//! after construction; storage contents can.

use std::collections::HashMap;

use crate::data::{Element, Storage};
use crate::debug_invariants::DebugInvariants;
use crate::stencil_error::StencilError;
use crate::topology::location::LocationType;

/// Symbolic stage parameter: a unique id and the location of its data.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Placeholder {
    id: usize,
    location: LocationType,
}

impl Placeholder {
    pub const fn new(id: usize, location: LocationType) -> Self {
        Self { id, location }
    }

    #[inline]
    pub const fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub const fn location(&self) -> LocationType {
        self.location
    }
}

/// Storages bound to placeholders.
#[derive(Debug)]
pub struct Domain<T: Element> {
    placeholders: Vec<Placeholder>,
    storages: Vec<Storage<T>>,
    index: HashMap<usize, usize>,
}

impl<T: Element> Domain<T> {
    /// Bind each placeholder to its storage, in order.
    ///
    /// # Errors
    /// - `DuplicateBinding` if a placeholder id appears twice.
    /// - `LocationMismatch` if a storage lives on another location than its
    ///   placeholder.
    pub fn bind(
        bindings: impl IntoIterator<Item = (Placeholder, Storage<T>)>,
    ) -> Result<Self, StencilError> {
        let mut placeholders = Vec::new();
        let mut storages = Vec::new();
        let mut index = HashMap::new();
        for (p, s) in bindings {
            if s.location() != p.location() {
                return Err(StencilError::LocationMismatch {
                    placeholder: p.id(),
                    expected: p.location(),
                    found: s.location(),
                });
            }
            if index.insert(p.id(), storages.len()).is_some() {
                return Err(StencilError::DuplicateBinding(p.id()));
            }
            placeholders.push(p);
            storages.push(s);
        }
        let domain = Self {
            placeholders,
            storages,
            index,
        };
        crate::debug_invariants!(domain.validate_invariants(), "Domain::bind");
        Ok(domain)
    }

    pub fn len(&self) -> usize {
        self.storages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }

    /// Placeholders in binding order.
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Binding position of placeholder id `id`.
    #[inline]
    pub fn position(&self, id: usize) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Whether `p` is bound (same id and location).
    pub fn contains(&self, p: &Placeholder) -> bool {
        self.position(p.id())
            .is_some_and(|pos| self.placeholders[pos] == *p)
    }

    fn lookup(&self, p: &Placeholder) -> Result<usize, StencilError> {
        let pos = self
            .position(p.id())
            .ok_or(StencilError::UnboundPlaceholder(p.id()))?;
        let bound = self.placeholders[pos];
        if bound.location() != p.location() {
            return Err(StencilError::LocationMismatch {
                placeholder: p.id(),
                expected: bound.location(),
                found: p.location(),
            });
        }
        Ok(pos)
    }

    /// Storage bound to `p`.
    pub fn storage(&self, p: &Placeholder) -> Result<&Storage<T>, StencilError> {
        let pos = self.lookup(p)?;
        Ok(&self.storages[pos])
    }

    /// Storage bound to `p`, writable.
    pub fn storage_mut(&mut self, p: &Placeholder) -> Result<&mut Storage<T>, StencilError> {
        let pos = self.lookup(p)?;
        Ok(&mut self.storages[pos])
    }

    pub(crate) fn storages(&self) -> &[Storage<T>] {
        &self.storages
    }

    pub(crate) fn storages_mut(&mut self) -> &mut [Storage<T>] {
        &mut self.storages
    }

    /// Copy every storage's host data to its device copy.
    pub fn sync_all_to_device(&mut self) -> Result<(), StencilError> {
        self.storages.iter_mut().try_for_each(Storage::sync_to_device)
    }

    /// Copy every storage's device data to its host copy.
    pub fn sync_all_to_host(&mut self) -> Result<(), StencilError> {
        self.storages.iter_mut().try_for_each(Storage::sync_to_host)
    }

    /// Take the storages back, in binding order.
    pub fn into_storages(self) -> Vec<(Placeholder, Storage<T>)> {
        self.placeholders.into_iter().zip(self.storages).collect()
    }
}

impl<T: Element> DebugInvariants for Domain<T> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Domain");
    }

    fn validate_invariants(&self) -> Result<(), StencilError> {
        if self.placeholders.len() != self.storages.len() || self.index.len() != self.storages.len() {
            return Err(StencilError::DuplicateBinding(usize::MAX));
        }
        for (pos, (p, s)) in self.placeholders.iter().zip(&self.storages).enumerate() {
            if self.index.get(&p.id()) != Some(&pos) {
                return Err(StencilError::DuplicateBinding(p.id()));
            }
            if s.location() != p.location() {
                return Err(StencilError::LocationMismatch {
                    placeholder: p.id(),
                    expected: p.location(),
                    found: s.location(),
                });
            }
        }
        Ok(())
    }
}
