//! Lock mode definitions.

/// Mode of an advisory whole-file lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders may read concurrently.
    Shared,
    /// A single holder may read and write.
    Exclusive,
}

impl LockMode {
    /// Whether a lock already held in `self` mode also satisfies a request for `requested`.
    pub fn covers(self, requested: LockMode) -> bool {
        matches!(
            (self, requested),
            (LockMode::Exclusive, _) | (LockMode::Shared, LockMode::Shared)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
