//! The routable message envelope and its inbound decode rule.
//!
//! Wire shape:
//!
//! ```json
//! { "type": "direct", "target": "<id>", "content": "hi", "from": "<id>" }
//! ```
//!
//! `from` is never read from the client. [`Envelope::decode`] stamps the
//! sender identity on every envelope it produces, and payloads that do not
//! match the schema are kept verbatim as a broadcast.

use serde::{Deserialize, Serialize};

use crate::errors::EnvelopeError;
use crate::ids::ClientId;

/// What the sender asked for. Delivery is decided by `target` alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Deliver to every connected party.
    #[default]
    Broadcast,
    /// Deliver to the party named in `target`.
    Direct,
    /// Announcement of a newly registered party.
    Register,
}

/// A message on its way through the hub.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Requested delivery kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Recipient for directed delivery; `None` means everyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ClientId>,
    /// Opaque payload.
    pub content: String,
    /// Identity of the session that read this message off the wire.
    pub from: ClientId,
}

/// Client-supplied fields. `from` is deliberately absent so a spoofed value
/// is discarded during deserialization.
#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type", default)]
    kind: MessageKind,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    content: String,
}

impl Envelope {
    /// Build a broadcast envelope around a raw payload.
    pub fn raw(content: impl Into<String>, from: ClientId) -> Self {
        Self {
            kind: MessageKind::Broadcast,
            target: None,
            content: content.into(),
            from,
        }
    }

    /// Build a directed envelope.
    pub fn direct(target: ClientId, content: impl Into<String>, from: ClientId) -> Self {
        Self {
            kind: MessageKind::Direct,
            target: Some(target),
            content: content.into(),
            from,
        }
    }

    /// Announcement sent to a new session so it learns its own identity.
    pub fn welcome(id: &ClientId) -> Self {
        Self {
            kind: MessageKind::Register,
            target: Some(id.clone()),
            content: id.to_string(),
            from: id.clone(),
        }
    }

    /// Strictly parse a client payload, stamping `from` with the sender.
    ///
    /// An empty `target` is treated as absent.
    pub fn parse(payload: &str, from: &ClientId) -> Result<Self, EnvelopeError> {
        let wire: WireEnvelope = serde_json::from_str(payload)?;
        Ok(Self {
            kind: wire.kind,
            target: wire.target.filter(|t| !t.is_empty()).map(ClientId::from),
            content: wire.content,
            from: from.clone(),
        })
    }

    /// Decode an inbound frame. Never fails: anything that is not a valid
    /// envelope becomes a broadcast whose content is the payload verbatim.
    pub fn decode(payload: &str, from: &ClientId) -> Self {
        Self::parse(payload, from).unwrap_or_else(|_| Self::raw(payload, from.clone()))
    }

    /// Whether this envelope goes to every registered party.
    pub fn is_broadcast(&self) -> bool {
        self.target.is_none()
    }

    /// Serialize for the outbound side.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}
