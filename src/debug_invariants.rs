//! Consistency checks for the topology and numbering tables.

use crate::assembly_error::AssemblyError;

/// A structure with internal consistency rules that can be checked on demand.
pub trait DebugInvariants {
    /// Validate every rule and return the first violation.
    fn validate_invariants(&self) -> Result<(), AssemblyError>;

    /// Panic on a violation in debug builds or with the `check-invariants`
    /// feature; a no-op otherwise.
    ///
    /// Only call this on values the crate built itself. Data from outside
    /// (deserialized layouts) goes through [`validate_invariants`](Self::validate_invariants).
    #[inline]
    fn debug_assert_invariants(&self) {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = self.validate_invariants() {
            panic!("[invariants] {}: {e}", std::any::type_name::<Self>());
        }
    }
}
