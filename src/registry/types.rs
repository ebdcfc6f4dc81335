//! Registry object records and events

use super::props::{keys, Properties};

/// Registry global id
pub type ObjectId = u32;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Parse `port.direction`; anything other than `in` is an output
    pub fn parse(value: &str) -> Self {
        if value == "in" {
            Direction::Input
        } else {
            Direction::Output
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "in",
            Direction::Output => "out",
        }
    }
}

/// Cached port metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRecord {
    pub global_id: ObjectId,
    pub node_id: ObjectId,
    pub direction: Direction,
    /// `port.id` within the owning node
    pub channel: u32,
}

impl PortRecord {
    /// Build from a property bag; `None` when a required key is missing
    pub fn from_props(global_id: ObjectId, props: &Properties) -> Option<Self> {
        let node_id = props.get_u32(keys::NODE_ID)?;
        let direction = Direction::parse(props.get(keys::PORT_DIRECTION)?);
        let channel = props.get_u32(keys::PORT_ID)?;

        Some(Self {
            global_id,
            node_id,
            direction,
            channel,
        })
    }

    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }
}

/// Cached node metadata, used for labels and feedback detection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: Option<String>,
    pub description: Option<String>,
    pub media_class: Option<String>,
    pub icon_name: Option<String>,
}

impl NodeRecord {
    pub fn from_props(props: &Properties) -> Self {
        let owned = |key: &str| props.get(key).map(str::to_string);
        Self {
            name: owned(keys::NODE_NAME),
            description: owned(keys::NODE_DESCRIPTION),
            media_class: owned(keys::MEDIA_CLASS),
            icon_name: owned(keys::APP_ICON_NAME),
        }
    }

    /// Human-readable label: description, else name
    pub fn label(&self) -> Option<&str> {
        [self.description.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
    }

    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.as_deref().is_some_and(|n| n.contains(needle))
    }
}

/// What the router decided about a cached link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// Not into the spatializer; left alone
    Passthrough,
    /// Uses a non-stereo output channel; destroy requested
    Rejected,
    /// Accepted into the given filter input
    FilterInput(usize),
    /// Destroy requested by the core; awaiting the removal event
    Retiring,
}

/// Cached link metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRecord {
    pub id: ObjectId,
    pub out_port: ObjectId,
    pub in_port: ObjectId,
    pub out_node: ObjectId,
    pub role: LinkRole,
}

impl LinkRecord {
    pub fn filter_input(&self) -> Option<usize> {
        match self.role {
            LinkRole::FilterInput(index) => Some(index),
            _ => None,
        }
    }
}

/// Endpoint port ids from a link's property bag
pub fn link_endpoints(props: &Properties) -> Option<(ObjectId, ObjectId)> {
    Some((
        props.get_u32(keys::LINK_OUTPUT_PORT)?,
        props.get_u32(keys::LINK_INPUT_PORT)?,
    ))
}

/// Registry notifications, delivered on the event loop thread
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    NodeAdded { id: ObjectId, props: Properties },
    NodeRemoved(ObjectId),
    PortAdded { id: ObjectId, props: Properties },
    PortRemoved(ObjectId),
    LinkAdded { id: ObjectId, props: Properties },
    LinkRemoved(ObjectId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_from_props() {
        let props = Properties::new()
            .with(keys::NODE_ID, "7")
            .with(keys::PORT_DIRECTION, "in")
            .with(keys::PORT_ID, "1");

        let port = PortRecord::from_props(30, &props).unwrap();
        assert_eq!(port.node_id, 7);
        assert!(port.is_input());
        assert_eq!(port.channel, 1);

        let incomplete = Properties::new().with(keys::NODE_ID, "7");
        assert!(PortRecord::from_props(31, &incomplete).is_none());
    }

    #[test]
    fn test_node_label_prefers_description() {
        let node = NodeRecord::from_props(
            &Properties::new()
                .with(keys::NODE_NAME, "spotify")
                .with(keys::NODE_DESCRIPTION, "Spotify"),
        );
        assert_eq!(node.label(), Some("Spotify"));

        let node = NodeRecord::from_props(
            &Properties::new()
                .with(keys::NODE_NAME, "vlc")
                .with(keys::NODE_DESCRIPTION, ""),
        );
        assert_eq!(node.label(), Some("vlc"));

        assert_eq!(NodeRecord::default().label(), None);
    }

    #[test]
    fn test_link_endpoints() {
        let props = Properties::new()
            .with(keys::LINK_OUTPUT_PORT, "11")
            .with(keys::LINK_INPUT_PORT, "22");
        assert_eq!(link_endpoints(&props), Some((11, 22)));
        assert_eq!(link_endpoints(&Properties::new()), None);
    }
}
