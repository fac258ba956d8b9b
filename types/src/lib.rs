//! Core domain types for rolesync.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod event;
mod ids;
mod menu;
mod token;

pub use event::{SelectionEvent, SelectionKind};
pub use ids::{ChannelId, ChannelRef, GuildId, MenuId, MessageId, PostingRef, RoleId, UserId};
pub use menu::{
    DEFAULT_DESCRIPTION, MAX_MENU_OPTIONS, MenuDefinition, MenuDraft, MenuMode, MenuOption,
    MenuValidationError,
};
pub use token::{Token, TokenParseError};
