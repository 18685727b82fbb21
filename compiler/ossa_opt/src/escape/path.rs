//! Projection paths: which part of a value an escape walk is tracking.

use std::fmt;

use smallvec::SmallVec;

use ossa_ir::ValueId;

/// Paths longer than this collapse their tail into [`PathComponent::Anything`].
pub const MAX_PATH_LEN: usize = 8;

/// One projection step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathComponent {
    /// Field `n` of a struct (value or address).
    Field(u32),
    /// The payload of enum case `n`.
    Case(u32),
    /// Some field, unknown which.
    AnyField,
    /// This part and everything below it. Only ever the last component.
    Anything,
}

/// A sequence of projections from a base value to the tracked part,
/// outermost first. The empty path tracks the whole value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProjectionPath {
    components: SmallVec<[PathComponent; 4]>,
}

impl ProjectionPath {
    /// The whole value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches every part of the value.
    pub fn anything() -> Self {
        Self::from_components([PathComponent::Anything])
    }

    /// Build a path from components, outermost first. Anything after an
    /// [`PathComponent::Anything`] is dropped, and an overlong path is
    /// collapsed.
    pub fn from_components(components: impl IntoIterator<Item = PathComponent>) -> Self {
        let mut path = ProjectionPath::new();
        for c in components {
            if path.components.len() + 1 == MAX_PATH_LEN && c != PathComponent::Anything {
                path.components.push(PathComponent::Anything);
                break;
            }
            path.components.push(c);
            if c == PathComponent::Anything {
                break;
            }
        }
        path
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    /// `self` seen from one projection further out: `c` becomes the
    /// outermost component.
    #[must_use]
    pub fn push(&self, c: PathComponent) -> Self {
        Self::from_components(std::iter::once(c).chain(self.components.iter().copied()))
    }

    /// `self` seen through projection `c`, or `None` if the projection
    /// leads away from the tracked part.
    ///
    /// Projecting the whole value yields the whole projected value.
    pub fn project(&self, c: PathComponent) -> Option<Self> {
        let Some(&first) = self.components.first() else {
            return Some(ProjectionPath::new());
        };
        let matches = match (first, c) {
            (PathComponent::Anything, _) => return Some(self.clone()),
            (PathComponent::AnyField, PathComponent::Field(_) | PathComponent::AnyField) => true,
            (PathComponent::Field(_), PathComponent::AnyField) => true,
            (a, b) => a == b,
        };
        matches.then(|| ProjectionPath {
            components: self.components[1..].iter().copied().collect(),
        })
    }

    /// Can the parts named by `self` and `other` (of the same base) share
    /// storage?
    ///
    /// Paths overlap unless they diverge at two distinct struct fields.
    /// Different enum cases share the payload storage, so they overlap.
    pub fn may_overlap(&self, other: &ProjectionPath) -> bool {
        for (&a, &b) in self.components.iter().zip(&other.components) {
            match (a, b) {
                (PathComponent::Anything, _) | (_, PathComponent::Anything) => return true,
                (PathComponent::Field(x), PathComponent::Field(y)) if x != y => return false,
                _ => {}
            }
        }
        true
    }
}

impl fmt::Display for ProjectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("<self>");
        }
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match c {
                PathComponent::Field(n) => write!(f, "s{n}")?,
                PathComponent::Case(n) => write!(f, "e{n}")?,
                PathComponent::AnyField => f.write_str("s*")?,
                PathComponent::Anything => f.write_str("**")?,
            }
        }
        Ok(())
    }
}

/// A value together with the part of it being tracked.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProjectedValue {
    pub value: ValueId,
    pub path: ProjectionPath,
}

impl ProjectedValue {
    /// The whole of `value`.
    pub fn new(value: ValueId) -> Self {
        ProjectedValue {
            value,
            path: ProjectionPath::new(),
        }
    }

    pub fn with_path(value: ValueId, path: ProjectionPath) -> Self {
        ProjectedValue { value, path }
    }
}

impl fmt::Display for ProjectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.value, self.path)
    }
}
