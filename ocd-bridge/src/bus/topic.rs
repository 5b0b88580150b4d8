use std::fmt;
use std::str::FromStr;

use super::BusError;

/// The topic tree of one driver instance, e.g. `pza/bench/memory/mcu`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interface {
    path: String,
}

impl Interface {
    pub fn new(path: impl Into<String>) -> Self {
        let path: String = path.into();
        Self {
            path: path.trim_end_matches('/').to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Topic a command named `name` is sent to.
    pub fn command(&self, name: &str) -> String {
        format!("{}/cmds/{name}", self.path)
    }

    /// Topic the attribute `name` is published on.
    pub fn attribute(&self, name: &str) -> String {
        format!("{}/atts/{name}", self.path)
    }

    /// Filter matching every command of this interface.
    pub fn commands(&self) -> String {
        format!("{}/cmds/#", self.path)
    }

    /// Extracts the command name from a topic below `<path>/cmds/`.
    pub fn command_name<'t>(&self, topic: &'t str) -> Option<&'t str> {
        topic
            .strip_prefix(self.path.as_str())?
            .strip_prefix("/cmds/")
            .filter(|name| !name.is_empty())
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Level {
    Exact(String),
    /// `+`
    Single,
    /// `#`, only valid as the last level.
    Rest,
}

/// A subscription filter with MQTT wildcard semantics.
///
/// `+` matches exactly one topic level, a trailing `#` matches the parent level
/// and everything below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    raw: String,
    levels: Vec<Level>,
}

impl TopicFilter {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, topic: &str) -> bool {
        let mut topic_levels = topic.split('/');

        for level in &self.levels {
            match level {
                Level::Rest => return true,
                Level::Single => {
                    if topic_levels.next().is_none() {
                        return false;
                    }
                }
                Level::Exact(expected) => match topic_levels.next() {
                    Some(actual) if actual == expected => {}
                    _ => return false,
                },
            }
        }

        topic_levels.next().is_none()
    }
}

impl FromStr for TopicFilter {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(BusError::InvalidFilter(s.to_string()));
        }

        let parts: Vec<&str> = s.split('/').collect();
        let last = parts.len() - 1;
        let mut levels = Vec::with_capacity(parts.len());

        for (index, part) in parts.into_iter().enumerate() {
            let level = match part {
                "#" if index == last => Level::Rest,
                "+" => Level::Single,
                part if part.contains(['#', '+']) => {
                    return Err(BusError::InvalidFilter(s.to_string()));
                }
                part => Level::Exact(part.to_string()),
            };
            levels.push(level);
        }

        Ok(Self {
            raw: s.to_string(),
            levels,
        })
    }
}

/// Topics that messages are published on must be concrete.
pub(crate) fn validate_topic(topic: &str) -> Result<(), BusError> {
    if topic.is_empty() || topic.contains(['#', '+']) {
        return Err(BusError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}
