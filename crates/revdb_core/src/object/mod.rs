//! Object kinds and identifiers.
//!
//! An object is the unit upon which undo operations are performed. Objects
//! reference each other by [`ObjectId`] only, never by address, so the
//! database can be serialized and reopened without pointer fixups.

mod id;

pub use id::ObjectId;

use crate::types::TypeId;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A registered object kind.
///
/// Each kind carries a unique [`TYPE_NUMBER`](Self::TYPE_NUMBER) whose low
/// 16 bits form the registry key, and a [`VERSION`](Self::VERSION) encoded
/// into the upper bits of [`TypeId`]. Objects must be cheap to clone: the
/// undo engine captures full pre-images, and the database facade hands out
/// owned copies.
///
/// The generic index owns id assignment. `set_id` is called exactly once
/// per object, immediately after the constructor runs.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Account {
///     id: ObjectId<Account>,
///     owner: String,
///     balance: i64,
/// }
///
/// impl ObjectKind for Account {
///     const TYPE_NUMBER: u16 = 1;
///
///     fn id(&self) -> ObjectId<Self> {
///         self.id
///     }
///
///     fn set_id(&mut self, id: ObjectId<Self>) {
///         self.id = id;
///     }
/// }
/// ```
pub trait ObjectKind: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique type number of this kind; the registry key.
    const TYPE_NUMBER: u16;

    /// Version number of this kind's stored layout.
    const VERSION: u16 = 1;

    /// Returns the object's id.
    fn id(&self) -> ObjectId<Self>;

    /// Overwrites the object's id. Called by the index on creation.
    fn set_id(&mut self, id: ObjectId<Self>);

    /// Returns the packed type identifier of this kind.
    #[must_use]
    fn type_id() -> TypeId {
        TypeId::pack(Self::TYPE_NUMBER, Self::VERSION)
    }

    /// Returns the kind's type name, used as its segment record key.
    #[must_use]
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}
