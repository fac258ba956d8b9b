use rolesync_types::{MenuDefinition, MenuOption, Token};

/// Map a mark to the option it selects, or `None` for marks that are not
/// part of the menu (spectator reactions), which must be ignored.
#[must_use]
pub fn resolve<'a>(menu: &'a MenuDefinition, token: &Token) -> Option<&'a MenuOption> {
    menu.option_for(token)
}
