//! The handlers collaborator: CRUD operations for the user resource.
//!
//! [`UserHandlers`] fills the manager's handlers slot. Persistence goes
//! through the database slot's SeaORM handle and payload checks go through
//! the validator slot, both resolved lazily per call, so whatever is in
//! those slots at request time is what gets used.

pub mod handlers;
pub mod storage;

pub use handlers::UserHandlers;
pub use storage::migrations::Migrator;
