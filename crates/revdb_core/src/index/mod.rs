//! Multi-index containers and the undo engine.
//!
//! The [`GenericIndex`] is where the database's hard guarantees live: it
//! couples a [`MultiIndex`] container with a stack of [`UndoState`]s and
//! keeps the two consistent through every create, modify, remove, undo,
//! squash, and commit.

mod generic;
mod hashed;
mod multi;
mod ordered;
mod traits;
mod undo;

pub use generic::GenericIndex;
pub use hashed::HashedIndex;
pub use multi::MultiIndex;
pub use ordered::OrderedIndex;
pub use traits::{IndexDefinition, IndexKey, KeyExtractor, SecondaryIndex};
pub use undo::UndoState;

pub(crate) use generic::IndexImage;
