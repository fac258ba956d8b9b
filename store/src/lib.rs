//! Persistence of reaction-role menus.
//!
//! [`MenuStore`] is the synchronous SQLite store; [`SharedMenuStore`] is the
//! cloneable async handle the engine and the binary hold.

mod menu_store;
mod shared;
mod sqlite_security;

pub use menu_store::MenuStore;
pub use shared::SharedMenuStore;
