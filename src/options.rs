use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Process-wide default for compaction. Flip this off to keep every per-sequence entry around,
/// which is handy when staring at a dumped index. It doesn't change query results.
static ZAMBONI: AtomicBool = AtomicBool::new(true);

pub fn zamboni_enabled() -> bool {
    ZAMBONI.load(Ordering::Relaxed)
}

pub fn set_zamboni_enabled(enabled: bool) {
    ZAMBONI.store(enabled, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartialLengthOptions {
    /// Fold entries at or below the window's minimum sequence number into the base length after
    /// every rebuild and update.
    pub(crate) zamboni: bool,
}

pub const OPTIONS_COMPACT: PartialLengthOptions = PartialLengthOptions {
    zamboni: true,
};

pub const OPTIONS_KEEP_HISTORY: PartialLengthOptions = PartialLengthOptions {
    zamboni: false,
};

impl Default for PartialLengthOptions {
    fn default() -> Self {
        PartialLengthOptions {
            zamboni: zamboni_enabled(),
        }
    }
}

impl PartialLengthOptions {
    pub fn compact() -> Self { OPTIONS_COMPACT }
    pub fn keep_history() -> Self { OPTIONS_KEEP_HISTORY }

    pub fn zamboni(mut self, zamboni: bool) -> Self {
        self.zamboni = zamboni;
        self
    }

    pub fn is_zamboni(&self) -> bool { self.zamboni }

    pub fn build(self) -> PartialLengthOptions {
        self
    }
}

pub type PartialLengthOptionsBuilder = PartialLengthOptions;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder_overrides_default() {
        let opts = PartialLengthOptions::compact().zamboni(false).build();
        assert!(!opts.is_zamboni());
        assert_eq!(opts, OPTIONS_KEEP_HISTORY);
    }
}
