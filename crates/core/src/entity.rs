//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Rules, actions and edges are all entities: two rows with the same id are
/// the same thing even if every other field differs between document versions.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
