//! # revdb core
//!
//! A transactional, in-process object database: multi-index containers with
//! multi-level undo, backed by a persistent segment image that survives
//! process restarts.
//!
//! Clients register strongly-typed object kinds, each with one or more
//! ordered/hashed secondary indices. Mutations are grouped into nested
//! sessions that may be committed, discarded (undone), or merged (squashed)
//! into the enclosing session; a session dropped without a terminal call
//! rolls back automatically.
//!
//! ```rust
//! use revdb_core::{Database, IndexDefinition, ObjectId, ObjectKind};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Account {
//!     id: ObjectId<Account>,
//!     owner: String,
//!     balance: i64,
//! }
//!
//! impl ObjectKind for Account {
//!     const TYPE_NUMBER: u16 = 1;
//!
//!     fn id(&self) -> ObjectId<Self> {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: ObjectId<Self>) {
//!         self.id = id;
//!     }
//! }
//!
//! let db = Database::open_in_memory().unwrap();
//! db.add_index::<Account>(
//!     IndexDefinition::new().ordered_unique("by_owner", |a: &Account| a.owner.clone()),
//! )
//! .unwrap();
//!
//! let mut session = db.start_undo_session(true).unwrap();
//! let acct = db
//!     .create::<Account>(|id| Account {
//!         id,
//!         owner: "alice".to_string(),
//!         balance: 100,
//!     })
//!     .unwrap();
//! session.push();
//!
//! assert_eq!(db.get::<Account>(acct.id).unwrap().balance, 100);
//! db.undo().unwrap();
//! assert!(db.find::<Account>(acct.id).unwrap().is_none());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod database;
pub mod error;
pub mod index;
pub mod lock;
pub mod object;
pub mod registry;
pub mod segment;
pub mod session;
pub mod stats;
pub mod types;

pub use config::{Config, OpenMode};
pub use database::Database;
pub use error::{DbError, DbResult};
pub use index::{GenericIndex, IndexDefinition, IndexKey, UndoState};
pub use object::{ObjectId, ObjectKind};
pub use registry::{AbstractIndex, IndexHandle, IndexRegistry};
pub use segment::{EnvironmentCheck, Segment};
pub use session::{IndexSession, Session};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use types::TypeId;
