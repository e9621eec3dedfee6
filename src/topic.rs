//! Sparkplug topic parsing and construction.
//!
//! This edge node speaks only node-level Sparkplug B messages; the
//! device-level (`DBIRTH`/`DDEATH`/`DDATA`/`DCMD`) topic forms exist in
//! the wider Sparkplug B spec but are out of scope (no managed-device
//! hierarchy). Topics follow:
//! - `spBv1.0/{group_id}/{message_type}/{edge_node_id}`
//! - `STATE/{scada_host_id}`

use crate::error::{Error, Result};

/// Sparkplug node-level message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Node Birth - published when a node comes online.
    NBirth,
    /// Node Death - published when a node goes offline (also set as the
    /// MQTT will message).
    NDeath,
    /// Node Data - published on a report-by-exception change.
    NData,
    /// Node Command - a command sent to a node (rebirth, scan rate, or
    /// a writable-tag write).
    NCmd,
    /// State - SCADA host application state.
    State,
}

impl MessageType {
    /// Returns the string representation used in MQTT topics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::NBirth => "NBIRTH",
            MessageType::NDeath => "NDEATH",
            MessageType::NData => "NDATA",
            MessageType::NCmd => "NCMD",
            MessageType::State => "STATE",
        }
    }

    /// Returns true if this is a birth message.
    pub fn is_birth(&self) -> bool {
        matches!(self, MessageType::NBirth)
    }

    /// Returns true if this is a death message.
    pub fn is_death(&self) -> bool {
        matches!(self, MessageType::NDeath)
    }

    /// Returns true if this is a command message.
    pub fn is_command(&self) -> bool {
        matches!(self, MessageType::NCmd)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NBIRTH" => Ok(MessageType::NBirth),
            "NDEATH" => Ok(MessageType::NDeath),
            "NDATA" => Ok(MessageType::NData),
            "NCMD" => Ok(MessageType::NCmd),
            "STATE" => Ok(MessageType::State),
            _ => Err(Error::Decode(format!("unknown message type: {s}"))),
        }
    }
}

/// A parsed Sparkplug topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTopic {
    /// A node-level Sparkplug message topic.
    Sparkplug {
        /// The message type.
        message_type: MessageType,
        /// The group ID.
        group_id: String,
        /// The edge node ID.
        edge_node_id: String,
    },
    /// A STATE topic for SCADA host application state.
    State {
        /// The SCADA host ID.
        host_id: String,
    },
}

impl ParsedTopic {
    /// Parses a Sparkplug topic string.
    ///
    /// # Examples
    ///
    /// ```
    /// use sparkplug_edge_node::topic::ParsedTopic;
    ///
    /// let topic = ParsedTopic::parse("spBv1.0/Energy/NDATA/Gateway01")?;
    /// let state = ParsedTopic::parse("STATE/ScadaHost01")?;
    /// # Ok::<(), sparkplug_edge_node::error::Error>(())
    /// ```
    pub fn parse(topic: &str) -> Result<Self> {
        let parts: Vec<&str> = topic.split('/').collect();

        if parts.len() == 2 && parts[0] == "STATE" {
            return Ok(ParsedTopic::State {
                host_id: parts[1].to_string(),
            });
        }

        if parts.len() != 4 {
            return Err(Error::Decode(format!(
                "topic must have exactly 4 parts, got {}",
                parts.len()
            )));
        }

        if parts[0] != "spBv1.0" {
            return Err(Error::Decode(format!(
                "topic must start with 'spBv1.0', got '{}'",
                parts[0]
            )));
        }

        let group_id = parts[1].to_string();
        if group_id == "STATE" {
            return Err(Error::Decode(
                "group_id 'STATE' is reserved for host-application state topics".into(),
            ));
        }
        let message_type: MessageType = parts[2].parse()?;
        let edge_node_id = parts[3].to_string();

        Ok(ParsedTopic::Sparkplug {
            message_type,
            group_id,
            edge_node_id,
        })
    }

    /// Returns the message type, if this is a Sparkplug message.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            ParsedTopic::Sparkplug { message_type, .. } => Some(*message_type),
            ParsedTopic::State { .. } => None,
        }
    }

    /// Returns the group ID, if this is a Sparkplug message.
    pub fn group_id(&self) -> Option<&str> {
        match self {
            ParsedTopic::Sparkplug { group_id, .. } => Some(group_id),
            ParsedTopic::State { .. } => None,
        }
    }

    /// Returns the edge node ID, if this is a Sparkplug message.
    pub fn edge_node_id(&self) -> Option<&str> {
        match self {
            ParsedTopic::Sparkplug { edge_node_id, .. } => Some(edge_node_id),
            ParsedTopic::State { .. } => None,
        }
    }

    /// Returns the host ID, if this is a STATE message.
    pub fn host_id(&self) -> Option<&str> {
        match self {
            ParsedTopic::State { host_id } => Some(host_id),
            ParsedTopic::Sparkplug { .. } => None,
        }
    }

    /// Converts the parsed topic back to a topic string.
    pub fn to_topic_string(&self) -> String {
        match self {
            ParsedTopic::Sparkplug {
                message_type,
                group_id,
                edge_node_id,
            } => format!(
                "spBv1.0/{}/{}/{}",
                group_id,
                message_type.as_str(),
                edge_node_id
            ),
            ParsedTopic::State { host_id } => format!("STATE/{}", host_id),
        }
    }

    /// Builds the node-level topic for `message_type` under the given
    /// group and edge node ids, rejecting the reserved `STATE` group id
    /// per the birth/death validation rule.
    pub fn node_topic(message_type: MessageType, group_id: &str, edge_node_id: &str) -> Result<String> {
        if group_id == "STATE" {
            return Err(Error::Validation(
                "group_id 'STATE' is reserved for host-application state topics".into(),
            ));
        }
        Ok(ParsedTopic::Sparkplug {
            message_type,
            group_id: group_id.to_string(),
            edge_node_id: edge_node_id.to_string(),
        }
        .to_topic_string())
    }
}

impl std::fmt::Display for ParsedTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_topic_string())
    }
}
