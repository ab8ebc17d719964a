//! Entity trait: identity across poll snapshots.

/// Entity marker + minimal interface.
///
/// Snapshots fetched in different poll cycles are distinct values; two of them
/// describe the same entity exactly when their identifiers are equal.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
