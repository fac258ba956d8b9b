//! SQLite-backed storage for menu definitions.
//!
//! One row per menu in `menus`, one row per option in `menu_options`
//! (ordered by `position`). Snowflakes are stored as TEXT since they are
//! unsigned 64-bit values. Every edit goes through the same
//! load → mutate → validate → rewrite cycle so a stored definition always
//! satisfies the menu invariants.

use std::error::Error as StdError;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Params, Row, Transaction, params};

use rolesync_types::{
    ChannelId, ChannelRef, GuildId, MenuDefinition, MenuDraft, MenuId, MenuMode, MenuOption,
    MenuValidationError, MessageId, PostingRef, RoleId, Token,
};

use crate::sqlite_security::prepare_db_path;

const MENU_COLUMNS: &str = "id, guild_id, channel_id, message_id, title, description, mode";

/// Raw `menus` row before option hydration.
struct MenuRow {
    id: i64,
    guild: String,
    channel: String,
    message: Option<String>,
    title: String,
    description: String,
    mode: String,
}

impl MenuRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            guild: row.get(1)?,
            channel: row.get(2)?,
            message: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            mode: row.get(6)?,
        })
    }
}

/// Persistent store for menu definitions.
pub struct MenuStore {
    db: Connection,
}

impl MenuStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS menus (
            id INTEGER PRIMARY KEY,
            guild_id TEXT NOT NULL,
            channel_id TEXT NOT NULL,
            message_id TEXT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            mode TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS menu_options (
            menu_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            token TEXT NOT NULL,
            role_id TEXT NOT NULL,
            label TEXT NOT NULL,
            PRIMARY KEY (menu_id, position),
            FOREIGN KEY (menu_id) REFERENCES menus(id) ON DELETE CASCADE
        );

        -- A posting routes to at most one menu
        CREATE UNIQUE INDEX IF NOT EXISTS idx_menus_posting
        ON menus(guild_id, channel_id, message_id);

        CREATE INDEX IF NOT EXISTS idx_menus_guild
        ON menus(guild_id);
    ";

    /// Open or create the menu database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        prepare_db_path(path)?;

        let db = Connection::open(path)
            .with_context(|| format!("Failed to open menu store at {}", path.display()))?;
        Self::initialize(db)
    }

    /// Open an in-memory menu store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory menu store")?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;",
        )
        .context("Failed to set menu store pragmas")?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create menu store schema")?;
        Ok(Self { db })
    }

    /// Store a new, not yet published menu.
    pub fn create(&mut self, draft: &MenuDraft) -> Result<MenuId> {
        let now = timestamp();
        let location = draft.location();
        let tx = self
            .db
            .transaction()
            .context("Failed to start menu store transaction")?;

        tx.execute(
            "INSERT INTO menus
                (guild_id, channel_id, message_id, title, description, mode, created_at, updated_at)
             VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?6)",
            params![
                location.guild.to_string(),
                location.channel.to_string(),
                draft.title(),
                draft.description(),
                draft.mode().as_str(),
                &now
            ],
        )
        .context("Failed to insert menu")?;

        let id = tx.last_insert_rowid();
        write_options(&tx, id, draft.options())?;
        tx.commit().context("Failed to commit new menu")?;

        tracing::debug!(menu = id, "Stored menu draft");
        Ok(MenuId::new(id))
    }

    /// Attach the published message to a menu, making it routable.
    pub fn bind_posting(&mut self, id: MenuId, message: MessageId) -> Result<MenuDefinition> {
        let changed = self
            .db
            .execute(
                "UPDATE menus SET message_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![message.to_string(), timestamp(), id.value()],
            )
            .with_context(|| format!("Failed to bind message {message} to menu {id}"))?;
        if changed == 0 {
            return Err(anyhow!("Menu {id} does not exist"));
        }
        self.find(id)?
            .ok_or_else(|| anyhow!("Menu {id} vanished after binding"))
    }

    pub fn find(&self, id: MenuId) -> Result<Option<MenuDefinition>> {
        let row = self
            .db
            .query_row(
                &format!("SELECT {MENU_COLUMNS} FROM menus WHERE id = ?1"),
                params![id.value()],
                MenuRow::from_row,
            )
            .optional()
            .with_context(|| format!("Failed to load menu {id}"))?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    /// Look up the menu routed from a posting.
    pub fn find_by_posting(&self, posting: PostingRef) -> Result<Option<MenuDefinition>> {
        let row = self
            .db
            .query_row(
                &format!(
                    "SELECT {MENU_COLUMNS} FROM menus
                     WHERE guild_id = ?1 AND channel_id = ?2 AND message_id = ?3"
                ),
                params![
                    posting.guild.to_string(),
                    posting.channel.to_string(),
                    posting.message.to_string()
                ],
                MenuRow::from_row,
            )
            .optional()
            .with_context(|| format!("Failed to load menu for posting {posting}"))?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    /// Every menu that has been published to a message.
    pub fn list_published(&self) -> Result<Vec<MenuDefinition>> {
        self.query_menus(
            &format!("SELECT {MENU_COLUMNS} FROM menus WHERE message_id IS NOT NULL ORDER BY id"),
            [],
        )
    }

    /// All menus in one guild, published or not.
    pub fn list_guild(&self, guild: GuildId) -> Result<Vec<MenuDefinition>> {
        self.query_menus(
            &format!("SELECT {MENU_COLUMNS} FROM menus WHERE guild_id = ?1 ORDER BY id"),
            params![guild.to_string()],
        )
    }

    pub fn set_title(&mut self, id: MenuId, title: &str) -> Result<MenuDefinition> {
        self.modify(id, |menu| menu.set_title(title))
    }

    pub fn set_mode(&mut self, id: MenuId, mode: MenuMode) -> Result<MenuDefinition> {
        self.modify(id, |menu| {
            menu.set_mode(mode);
            Ok(())
        })
    }

    pub fn add_option(&mut self, id: MenuId, option: MenuOption) -> Result<MenuDefinition> {
        self.modify(id, |menu| menu.add_option(option))
    }

    pub fn remove_option(&mut self, id: MenuId, index: usize) -> Result<MenuDefinition> {
        self.modify(id, |menu| menu.remove_option(index).map(drop))
    }

    pub fn replace_option(
        &mut self,
        id: MenuId,
        index: usize,
        option: MenuOption,
    ) -> Result<MenuDefinition> {
        self.modify(id, |menu| menu.replace_option(index, option).map(drop))
    }

    /// Remove the menu published at `posting`. Returns whether one existed.
    pub fn delete_by_posting(&mut self, posting: PostingRef) -> Result<bool> {
        let deleted = self
            .db
            .execute(
                "DELETE FROM menus WHERE guild_id = ?1 AND channel_id = ?2 AND message_id = ?3",
                params![
                    posting.guild.to_string(),
                    posting.channel.to_string(),
                    posting.message.to_string()
                ],
            )
            .with_context(|| format!("Failed to delete menu for posting {posting}"))?;
        Ok(deleted > 0)
    }

    fn modify<F>(&mut self, id: MenuId, edit: F) -> Result<MenuDefinition>
    where
        F: FnOnce(&mut MenuDefinition) -> Result<(), MenuValidationError>,
    {
        let mut menu = self
            .find(id)?
            .ok_or_else(|| anyhow!("Menu {id} does not exist"))?;
        edit(&mut menu).with_context(|| format!("Rejected edit to menu {id}"))?;

        let tx = self
            .db
            .transaction()
            .context("Failed to start menu store transaction")?;
        tx.execute(
            "UPDATE menus SET title = ?1, description = ?2, mode = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                menu.title(),
                menu.description(),
                menu.mode().as_str(),
                timestamp(),
                id.value()
            ],
        )
        .with_context(|| format!("Failed to update menu {id}"))?;
        tx.execute(
            "DELETE FROM menu_options WHERE menu_id = ?1",
            params![id.value()],
        )
        .with_context(|| format!("Failed to clear options of menu {id}"))?;
        write_options(&tx, id.value(), menu.options())?;
        tx.commit()
            .with_context(|| format!("Failed to commit edit to menu {id}"))?;

        Ok(menu)
    }

    fn query_menus<P: Params>(&self, sql: &str, args: P) -> Result<Vec<MenuDefinition>> {
        let mut stmt = self
            .db
            .prepare(sql)
            .context("Failed to prepare menu query")?;
        let rows = stmt
            .query_map(args, MenuRow::from_row)
            .context("Failed to query menus")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read menu rows")?;
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn hydrate(&self, row: MenuRow) -> Result<MenuDefinition> {
        let id = MenuId::new(row.id);
        let location = ChannelRef::new(
            parse_snowflake::<GuildId>(&row.guild, "guild_id")?,
            parse_snowflake::<ChannelId>(&row.channel, "channel_id")?,
        );
        let message = row
            .message
            .as_deref()
            .map(|raw| parse_snowflake::<MessageId>(raw, "message_id"))
            .transpose()?;
        let mode = MenuMode::parse(&row.mode)
            .ok_or_else(|| anyhow!("Menu {id} has unknown mode {:?}", row.mode))?;
        let options = self.load_options(row.id)?;

        MenuDefinition::restore(
            id,
            location,
            message,
            row.title,
            row.description,
            mode,
            options,
        )
        .with_context(|| format!("Stored menu {id} is invalid"))
    }

    fn load_options(&self, menu_id: i64) -> Result<Vec<MenuOption>> {
        let mut stmt = self
            .db
            .prepare(
                "SELECT token, role_id, label FROM menu_options
                 WHERE menu_id = ?1 ORDER BY position ASC",
            )
            .context("Failed to prepare option query")?;
        let rows = stmt
            .query_map(params![menu_id], |row| {
                let token: String = row.get(0)?;
                let role: String = row.get(1)?;
                let label: String = row.get(2)?;
                Ok((token, role, label))
            })
            .context("Failed to query menu options")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read menu options")?;

        rows.into_iter()
            .map(|(token, role, label)| {
                let token = Token::parse(&token)
                    .with_context(|| format!("Menu #{menu_id} has malformed token {token:?}"))?;
                let role = parse_snowflake::<RoleId>(&role, "role_id")?;
                Ok(MenuOption::new(token, role, label))
            })
            .collect()
    }
}

fn write_options(tx: &Transaction<'_>, menu_id: i64, options: &[MenuOption]) -> Result<()> {
    let mut stmt = tx
        .prepare(
            "INSERT INTO menu_options (menu_id, position, token, role_id, label)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .context("Failed to prepare option insert")?;
    for (position, option) in options.iter().enumerate() {
        stmt.execute(params![
            menu_id,
            position as i64,
            option.token.to_string(),
            option.role.to_string(),
            &option.label
        ])
        .with_context(|| format!("Failed to insert option {}", option.token))?;
    }
    Ok(())
}

fn parse_snowflake<T>(raw: &str, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("Malformed {column} {raw:?}"))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
