use std::collections::HashSet;
use std::path::Path;

use crate::ConfigError;

/// One workshop participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendeeRecord {
    pub name: String,
    /// Only used by the notifier, never by provisioning.
    pub email: Option<String>,
}

impl AttendeeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
        }
    }
}

pub fn load_roster(path: &Path) -> Result<Vec<AttendeeRecord>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::RosterNotFound(path.to_owned())
        } else {
            ConfigError::RosterRead {
                path: path.to_owned(),
                source,
            }
        }
    })?;
    let roster = parse_roster(&contents)?;
    tracing::debug!(path = %path.display(), attendees = roster.len(), "loaded roster");
    Ok(roster)
}

/// One attendee per line, optionally followed by `,email`. Blank lines and
/// lines starting with `#` are ignored, later duplicates are dropped.
pub fn parse_roster(contents: &str) -> Result<Vec<AttendeeRecord>, ConfigError> {
    let mut seen = HashSet::new();
    let mut roster = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, email) = match line.split_once(',') {
            Some((name, email)) => (name.trim(), Some(email.trim())),
            None => (line, None),
        };
        if name.is_empty() {
            return Err(ConfigError::RosterLine {
                line: index + 1,
                reason: "missing attendee name".to_owned(),
            });
        }
        // resource names are derived from the ASCII letters and digits only
        if !name.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::RosterLine {
                line: index + 1,
                reason: format!("attendee name {name} has no ASCII letters or digits"),
            });
        }
        if !seen.insert(name.to_owned()) {
            tracing::warn!(attendee = name, line = index + 1, "duplicate attendee ignored");
            continue;
        }
        roster.push(AttendeeRecord {
            name: name.to_owned(),
            email: email.filter(|email| !email.is_empty()).map(str::to_owned),
        });
    }
    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_blank_lines_and_duplicates() {
        let roster = parse_roster(
            "# workshop attendees\n\nalice\n  bob , bob@example.com \n\nalice,other@example.com\n#carol\n",
        )
        .unwrap();
        assert_eq!(
            roster,
            vec![
                AttendeeRecord::new("alice"),
                AttendeeRecord {
                    name: "bob".to_owned(),
                    email: Some("bob@example.com".to_owned()),
                },
            ]
        );
    }

    #[test]
    fn empty_email_is_none() {
        let roster = parse_roster("dave,\n").unwrap();
        assert_eq!(roster, vec![AttendeeRecord::new("dave")]);
    }

    #[test]
    fn line_without_name_is_rejected() {
        let error = parse_roster("alice\n,ghost@example.com\n").unwrap_err();
        assert!(matches!(error, ConfigError::RosterLine { line: 2, .. }));
    }

    #[test]
    fn name_without_letters_or_digits_is_rejected() {
        for roster in ["alice\n!!!\n", "alice\nßü,sue@example.com\n"] {
            let error = parse_roster(roster).unwrap_err();
            assert!(matches!(error, ConfigError::RosterLine { line: 2, .. }), "{roster}");
        }
        assert_eq!(parse_roster("Zoë\n").unwrap(), vec![AttendeeRecord::new("Zoë")]);
    }

    #[test]
    fn missing_roster_file_is_an_error() {
        let error = load_roster(Path::new("/nonexistent/attendees.txt")).unwrap_err();
        assert!(matches!(error, ConfigError::RosterNotFound(_)));
    }
}
