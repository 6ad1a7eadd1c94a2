//! The interactive menu: one line of input per command.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    ViewConfig,
    ShowRoster,
    List,
    /// `None` means every attendee on the roster.
    Create(Option<String>),
    Delete(Option<String>),
    Quit,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MenuError {
    #[error("no command given")]
    Empty,
    #[error("unknown command {0}")]
    UnknownKey(String),
    #[error("command {0} does not take an attendee name")]
    UnexpectedArgument(String),
}

struct MenuEntry {
    keys: &'static [&'static str],
    usage: &'static str,
    description: &'static str,
    takes_name: bool,
    build: fn(Option<String>) -> MenuCommand,
}

static ENTRIES: [MenuEntry; 6] = [
    MenuEntry {
        keys: &["V"],
        usage: "V",
        description: "show current configuration",
        takes_name: false,
        build: |_| MenuCommand::ViewConfig,
    },
    MenuEntry {
        keys: &["A", "S"],
        usage: "A/S",
        description: "show attendees",
        takes_name: false,
        build: |_| MenuCommand::ShowRoster,
    },
    MenuEntry {
        keys: &["L"],
        usage: "L",
        description: "list all resources in the resource group",
        takes_name: false,
        build: |_| MenuCommand::List,
    },
    MenuEntry {
        keys: &["C"],
        usage: "C [name]",
        description: "create resources for all attendees, or just one",
        takes_name: true,
        build: MenuCommand::Create,
    },
    MenuEntry {
        keys: &["D"],
        usage: "D [name]",
        description: "delete resources for all attendees, or just one",
        takes_name: true,
        build: MenuCommand::Delete,
    },
    MenuEntry {
        keys: &["Q"],
        usage: "Q",
        description: "quit",
        takes_name: false,
        build: |_| MenuCommand::Quit,
    },
];

/// Keys are case insensitive, everything after the key is the attendee name.
pub fn parse(line: &str) -> Result<MenuCommand, MenuError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(MenuError::Empty);
    }
    let (key, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let name = Some(rest.trim()).filter(|name| !name.is_empty()).map(str::to_owned);
    let entry = ENTRIES
        .iter()
        .find(|entry| entry.keys.iter().any(|k| k.eq_ignore_ascii_case(key)))
        .ok_or_else(|| MenuError::UnknownKey(key.to_owned()))?;
    if name.is_some() && !entry.takes_name {
        return Err(MenuError::UnexpectedArgument(key.to_owned()));
    }
    Ok((entry.build)(name))
}

#[must_use]
pub fn render() -> String {
    ENTRIES
        .iter()
        .map(|entry| format!("  {:<10} {}\n", entry.usage, entry.description))
        .collect()
}
