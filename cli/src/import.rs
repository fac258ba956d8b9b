//! Menu files: the TOML form an operator writes to create a menu.
//!
//! ```toml
//! guild = "500"
//! channel = "600"
//! message = "700"
//! title = "Elements"
//! mode = "exclusive"
//!
//! [[options]]
//! token = "🔥"
//! role = "101"
//! label = "Fire"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use rolesync_store::MenuStore;
use rolesync_types::{
    ChannelId, ChannelRef, GuildId, MenuDefinition, MenuDraft, MenuMode, MenuOption, MessageId,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuFile {
    pub guild: GuildId,
    pub channel: ChannelId,
    /// Posting to bind to; omitted when the message is not posted yet.
    pub message: Option<MessageId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub mode: MenuMode,
    pub options: Vec<MenuOption>,
}

impl MenuFile {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read menu file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid menu file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn draft(&self) -> Result<MenuDraft> {
        let draft = MenuDraft::new(
            ChannelRef::new(self.guild, self.channel),
            self.title.clone(),
            self.mode,
            self.options.clone(),
        )?;
        Ok(match &self.description {
            Some(description) => draft.with_description(description.clone()),
            None => draft,
        })
    }
}

/// Store the menu and bind it to its posting when one was given.
pub fn import(store: &mut MenuStore, file: &MenuFile) -> Result<MenuDefinition> {
    let draft = file.draft()?;
    let id = store.create(&draft)?;
    match file.message {
        Some(message) => store.bind_posting(id, message),
        None => store
            .find(id)?
            .with_context(|| format!("Menu {id} vanished after insert")),
    }
}
