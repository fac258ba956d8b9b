//! Menu definitions: which token grants which group on one posting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChannelRef, MenuId, MessageId, PostingRef, RoleId, Token};

/// Upper bound on options per menu; the platform caps a select menu at the
/// same size, and every option costs one reaction slot on the posting.
pub const MAX_MENU_OPTIONS: usize = 20;

pub const DEFAULT_DESCRIPTION: &str = "React to pick your roles";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MenuValidationError {
    #[error("menu title must not be empty")]
    EmptyTitle,
    #[error("menu must offer at least one option")]
    NoOptions,
    #[error("menu offers {count} options; at most {MAX_MENU_OPTIONS} are allowed")]
    TooManyOptions { count: usize },
    #[error("token {0} is used by more than one option")]
    DuplicateToken(Token),
    #[error("role {0} is granted by more than one option")]
    DuplicateRole(RoleId),
    #[error("option {token} has an empty label")]
    EmptyLabel { token: Token },
    #[error("option index {index} out of range (menu has {len} options)")]
    OptionIndex { index: usize, len: usize },
}

/// Selection policy of a menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuMode {
    /// At most one of the menu's roles may be held at a time.
    #[serde(alias = "simple")]
    Exclusive,
    /// Any subset of the menu's roles may be held.
    #[default]
    #[serde(alias = "multiple")]
    Multi,
}

impl MenuMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::Multi => "multi",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclusive" | "simple" | "single" => Some(Self::Exclusive),
            "multi" | "multiple" => Some(Self::Multi),
            _ => None,
        }
    }
}

/// One selectable entry of a menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub token: Token,
    pub role: RoleId,
    pub label: String,
}

impl MenuOption {
    #[must_use]
    pub fn new(token: Token, role: RoleId, label: impl Into<String>) -> Self {
        Self {
            token,
            role,
            label: label.into(),
        }
    }
}

fn validate(title: &str, options: &[MenuOption]) -> Result<(), MenuValidationError> {
    if title.trim().is_empty() {
        return Err(MenuValidationError::EmptyTitle);
    }
    if options.is_empty() {
        return Err(MenuValidationError::NoOptions);
    }
    if options.len() > MAX_MENU_OPTIONS {
        return Err(MenuValidationError::TooManyOptions {
            count: options.len(),
        });
    }
    for (i, option) in options.iter().enumerate() {
        if option.label.trim().is_empty() {
            return Err(MenuValidationError::EmptyLabel {
                token: option.token.clone(),
            });
        }
        let earlier = &options[..i];
        if earlier.iter().any(|o| o.token == option.token) {
            return Err(MenuValidationError::DuplicateToken(option.token.clone()));
        }
        if earlier.iter().any(|o| o.role == option.role) {
            return Err(MenuValidationError::DuplicateRole(option.role));
        }
    }
    Ok(())
}

/// A validated menu that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuDraft {
    location: ChannelRef,
    title: String,
    description: String,
    mode: MenuMode,
    options: Vec<MenuOption>,
}

impl MenuDraft {
    pub fn new(
        location: ChannelRef,
        title: impl Into<String>,
        mode: MenuMode,
        options: Vec<MenuOption>,
    ) -> Result<Self, MenuValidationError> {
        let title = title.into();
        validate(&title, &options)?;
        Ok(Self {
            location,
            title,
            description: DEFAULT_DESCRIPTION.to_string(),
            mode,
            options,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn location(&self) -> ChannelRef {
        self.location
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn mode(&self) -> MenuMode {
        self.mode
    }

    #[must_use]
    pub fn options(&self) -> &[MenuOption] {
        &self.options
    }
}

/// A stored menu. Its identity for event routing is the posting, which only
/// exists once the menu message has been published.
///
/// Invariant: tokens and roles are each unique across `options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuDefinition {
    id: MenuId,
    location: ChannelRef,
    message: Option<MessageId>,
    title: String,
    description: String,
    mode: MenuMode,
    options: Vec<MenuOption>,
}

impl MenuDefinition {
    #[must_use]
    pub fn from_draft(id: MenuId, draft: MenuDraft, message: Option<MessageId>) -> Self {
        Self {
            id,
            location: draft.location,
            message,
            title: draft.title,
            description: draft.description,
            mode: draft.mode,
            options: draft.options,
        }
    }

    /// Rebuild a definition from persisted columns, re-checking invariants.
    pub fn restore(
        id: MenuId,
        location: ChannelRef,
        message: Option<MessageId>,
        title: String,
        description: String,
        mode: MenuMode,
        options: Vec<MenuOption>,
    ) -> Result<Self, MenuValidationError> {
        validate(&title, &options)?;
        Ok(Self {
            id,
            location,
            message,
            title,
            description,
            mode,
            options,
        })
    }

    #[must_use]
    pub fn id(&self) -> MenuId {
        self.id
    }

    #[must_use]
    pub fn location(&self) -> ChannelRef {
        self.location
    }

    #[must_use]
    pub fn message(&self) -> Option<MessageId> {
        self.message
    }

    #[must_use]
    pub fn posting(&self) -> Option<PostingRef> {
        self.message.map(|message| self.location.posting(message))
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn mode(&self) -> MenuMode {
        self.mode
    }

    #[must_use]
    pub fn options(&self) -> &[MenuOption] {
        &self.options
    }

    #[must_use]
    pub fn option_for(&self, token: &Token) -> Option<&MenuOption> {
        self.options.iter().find(|option| &option.token == token)
    }

    /// Every option except the one selected by `token`.
    pub fn others<'a>(&'a self, token: &'a Token) -> impl Iterator<Item = &'a MenuOption> + 'a {
        self.options.iter().filter(move |option| &option.token != token)
    }

    #[must_use]
    pub fn bind(mut self, message: MessageId) -> Self {
        self.message = Some(message);
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), MenuValidationError> {
        let title = title.into();
        validate(&title, &self.options)?;
        self.title = title;
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_mode(&mut self, mode: MenuMode) {
        self.mode = mode;
    }

    pub fn add_option(&mut self, option: MenuOption) -> Result<(), MenuValidationError> {
        let mut options = self.options.clone();
        options.push(option);
        validate(&self.title, &options)?;
        self.options = options;
        Ok(())
    }

    pub fn remove_option(&mut self, index: usize) -> Result<MenuOption, MenuValidationError> {
        self.check_index(index)?;
        let mut options = self.options.clone();
        let removed = options.remove(index);
        validate(&self.title, &options)?;
        self.options = options;
        Ok(removed)
    }

    pub fn replace_option(
        &mut self,
        index: usize,
        option: MenuOption,
    ) -> Result<MenuOption, MenuValidationError> {
        self.check_index(index)?;
        let mut options = self.options.clone();
        let previous = std::mem::replace(&mut options[index], option);
        validate(&self.title, &options)?;
        self.options = options;
        Ok(previous)
    }

    fn check_index(&self, index: usize) -> Result<(), MenuValidationError> {
        if index >= self.options.len() {
            return Err(MenuValidationError::OptionIndex {
                index,
                len: self.options.len(),
            });
        }
        Ok(())
    }
}
