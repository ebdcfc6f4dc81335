//! String property bags delivered with registry objects

use std::collections::HashMap;

/// Well-known property keys
pub mod keys {
    pub const NODE_NAME: &str = "node.name";
    pub const NODE_DESCRIPTION: &str = "node.description";
    pub const MEDIA_CLASS: &str = "media.class";
    pub const APP_ICON_NAME: &str = "application.icon-name";
    pub const NODE_ID: &str = "node.id";
    pub const PORT_DIRECTION: &str = "port.direction";
    pub const PORT_ID: &str = "port.id";
    pub const LINK_OUTPUT_PORT: &str = "link.output.port";
    pub const LINK_INPUT_PORT: &str = "link.input.port";
}

/// Key/value properties of a registry object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parse a numeric property; malformed values count as absent
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_lookup() {
        let props = Properties::new()
            .with(keys::PORT_ID, "3")
            .with(keys::NODE_ID, " 42 ")
            .with(keys::LINK_INPUT_PORT, "abc");

        assert_eq!(props.get_u32(keys::PORT_ID), Some(3));
        assert_eq!(props.get_u32(keys::NODE_ID), Some(42));
        assert_eq!(props.get_u32(keys::LINK_INPUT_PORT), None);
        assert_eq!(props.get_u32(keys::LINK_OUTPUT_PORT), None);
    }

    #[test]
    fn test_from_iter() {
        let props: Properties = [(keys::NODE_NAME, "vlc")].into_iter().collect();
        assert_eq!(props.get(keys::NODE_NAME), Some("vlc"));
        assert_eq!(props.len(), 1);
    }
}
