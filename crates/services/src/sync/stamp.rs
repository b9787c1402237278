use std::fmt;

/// Monotonic stamp issued to each save cycle.
///
/// A cycle's result is applied locally only while its stamp is still the
/// latest issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SaveStamp(u64);

impl SaveStamp {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub(crate) fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SaveStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
