//! Memoized request properties
//!
//! A field starts `Unresolved`, is computed on first read and then kept.
//! `override_with` replaces the value at any time and also marks it resolved.

#[derive(Debug, Clone, Default)]
pub enum LazyField<T> {
    #[default]
    Unresolved,
    Resolved(T),
}

impl<T> LazyField<T> {
    /// Return the cached value, computing it with `init` on first read
    pub fn resolve(&mut self, init: impl FnOnce() -> T) -> &T {
        if let Self::Unresolved = self {
            *self = Self::Resolved(init());
        }
        match self {
            Self::Resolved(value) => value,
            Self::Unresolved => unreachable!("field resolved above"),
        }
    }

    /// Fallible variant of [`resolve`](Self::resolve)
    ///
    /// A failed computation leaves the field unresolved, so the next read retries.
    pub fn try_resolve<E>(&mut self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Self::Unresolved = self {
            *self = Self::Resolved(init()?);
        }
        match self {
            Self::Resolved(value) => Ok(value),
            Self::Unresolved => unreachable!("field resolved above"),
        }
    }

    pub fn override_with(&mut self, value: T) {
        *self = Self::Resolved(value);
    }

    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_runs_once() {
        let mut calls = 0;
        let mut field = LazyField::Unresolved;
        let first = *field.resolve(|| {
            calls += 1;
            7
        });
        assert_eq!(first, 7);
        let second = *field.resolve(|| {
            calls += 1;
            9
        });
        assert_eq!(second, 7);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_override_wins() {
        let mut field = LazyField::Unresolved;
        field.override_with("set");
        assert!(field.is_resolved());
        assert_eq!(*field.resolve(|| "computed"), "set");

        field.override_with("again");
        assert_eq!(*field.resolve(|| "computed"), "again");
    }

    #[test]
    fn test_failed_resolution_is_retried() {
        let mut field: LazyField<u8> = LazyField::Unresolved;
        assert!(field.try_resolve(|| Err::<u8, &str>("bad")).is_err());
        assert!(!field.is_resolved());
        assert_eq!(field.try_resolve(|| Ok::<u8, &str>(3)), Ok(&3));
    }
}
