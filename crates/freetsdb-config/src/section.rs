//! The contract every configuration section fulfils.

use crate::{Overridable, Violations};

/// A named, independently validated fragment of the configuration document.
///
/// A section is either a singleton table (`[http]`) or one element of a
/// repeated array of tables (`[[graphite]]`). Either way the same type
/// describes it; only the owning [`Config`](crate::Config) field differs.
pub trait Section: Overridable {
    /// Name of the section in the document and in override keys.
    const NAME: &'static str;

    /// Whether the service behind this section will run.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether `enabled` was written in the document (or an override) rather
    /// than taken from the default.
    ///
    /// Only the storage sections (`meta`, `data`) keep `enabled` as written;
    /// every other section always answers `false`.
    fn has_explicit_enabled(&self) -> bool {
        false
    }

    /// Check the section's own fields. Field names reported to `violations`
    /// are relative to the section.
    fn validate(&self, _violations: &mut Violations) {}
}
