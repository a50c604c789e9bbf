//! Reference records: master rows edited in place and looked up by name.

/// A master record kept as a plain row rather than rebuilt from events
/// (stores, sizes, colors, transaction and expense categories).
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Display name, unique among records of the same kind.
    fn name(&self) -> &str;

    /// Names match trimmed and ignoring ASCII case.
    fn is_named(&self, name: &str) -> bool {
        self.name().trim().eq_ignore_ascii_case(name.trim())
    }
}
