//! Stages: a rule bound to placeholders over one location type.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::data::Element;
use crate::stencil::accessor::Accessor;
use crate::stencil::domain::Placeholder;
use crate::stencil::evaluation::Rule;
use crate::stencil_error::StencilError;
use crate::topology::location::LocationType;

/// A rule, the location it iterates over, and the placeholder bound to each
/// of its accessors (positionally).
pub struct Stage<T: Element> {
    name: String,
    rule: Arc<dyn Rule<T>>,
    location: LocationType,
    bindings: Vec<(Placeholder, Accessor)>,
    params: BTreeSet<Placeholder>,
}

impl<T: Element> Clone for Stage<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            rule: Arc::clone(&self.rule),
            location: self.location,
            bindings: self.bindings.clone(),
            params: self.params.clone(),
        }
    }
}

impl<T: Element> fmt::Debug for Stage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl<T: Element> Stage<T> {
    /// Bind `args` to the accessors of `rule`, in slot order.
    ///
    /// # Errors
    /// - `MalformedRule` if the rule's accessor slots are not `0..n` in order.
    /// - `InvalidExtent` if an inout accessor has a horizontal extent.
    /// - `ArityMismatch` if `args` and the accessors differ in count.
    /// - `DuplicatePlaceholder` if a placeholder is passed twice.
    /// - `LocationMismatch` if a placeholder's location differs from its
    ///   accessor's, or an inout accessor is not on `location`.
    pub fn new(
        rule: impl Rule<T> + 'static,
        location: LocationType,
        args: impl IntoIterator<Item = Placeholder>,
    ) -> Result<Self, StencilError> {
        Self::from_shared(Arc::new(rule), location, args)
    }

    /// Like [`new`](Self::new), sharing an already allocated rule.
    pub fn from_shared(
        rule: Arc<dyn Rule<T>>,
        location: LocationType,
        args: impl IntoIterator<Item = Placeholder>,
    ) -> Result<Self, StencilError> {
        let name = rule.name().to_string();
        let accessors = rule.accessors();
        for (position, acc) in accessors.iter().enumerate() {
            if acc.slot != position {
                return Err(StencilError::MalformedRule {
                    rule: name,
                    position,
                    found: acc.slot,
                });
            }
            acc.validate()?;
        }

        let args: Vec<Placeholder> = args.into_iter().collect();
        if args.len() != accessors.len() {
            return Err(StencilError::ArityMismatch {
                stage: name,
                expected: accessors.len(),
                found: args.len(),
            });
        }

        let mut params = BTreeSet::new();
        let mut ids = BTreeSet::new();
        for (p, acc) in args.iter().zip(&accessors) {
            if !ids.insert(p.id()) {
                return Err(StencilError::DuplicatePlaceholder {
                    placeholder: p.id(),
                    stage: name,
                });
            }
            if p.location() != acc.location {
                return Err(StencilError::LocationMismatch {
                    placeholder: p.id(),
                    expected: acc.location,
                    found: p.location(),
                });
            }
            if acc.is_writable() && acc.location != location {
                return Err(StencilError::LocationMismatch {
                    placeholder: p.id(),
                    expected: location,
                    found: acc.location,
                });
            }
            params.insert(*p);
        }

        log::debug!(
            "stage `{name}` on {location}: {} parameters, {} written",
            args.len(),
            accessors.iter().filter(|a| a.is_writable()).count()
        );
        Ok(Self {
            name,
            rule,
            location,
            bindings: args.into_iter().zip(accessors).collect(),
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> LocationType {
        self.location
    }

    pub fn rule(&self) -> &dyn Rule<T> {
        &*self.rule
    }

    /// `(placeholder, accessor)` pairs in slot order.
    pub fn bindings(&self) -> &[(Placeholder, Accessor)] {
        &self.bindings
    }

    /// Whether `p` is among this stage's arguments.
    pub fn has_parameter(&self, p: &Placeholder) -> bool {
        self.params.contains(p)
    }

    /// Placeholders read without being written.
    pub fn reads(&self) -> impl Iterator<Item = &(Placeholder, Accessor)> {
        self.bindings.iter().filter(|(_, a)| !a.is_writable())
    }

    /// Placeholders written (and possibly read).
    pub fn writes(&self) -> impl Iterator<Item = &(Placeholder, Accessor)> {
        self.bindings.iter().filter(|(_, a)| a.is_writable())
    }

    /// Whether this stage writes `p`.
    pub fn writes_to(&self, p: &Placeholder) -> bool {
        self.writes().any(|(q, _)| q == p)
    }
}
