//! Event taxonomy
//!
//! Every observed change is an immutable [`Event`]. Each event has an
//! [`EventKind`], and kinds form a tree through [`EventKind::parent`] so a
//! subscriber can register for a whole category.

use std::fmt;
use std::sync::Arc;

use crate::data::{Account, DirectMessage, Status};

/// Node of the event type tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Root; matches every event
    Any,

    /// Category of status events
    Status,
    StatusReceived,
    Mention,
    StatusDeleted,

    Favorite,
    Follow,

    /// Category of direct message events
    DirectMessage,
    DirectMessageReceived,
    DirectMessageFetched,

    /// Category of user-facing messages
    Message,
    Info,
    Warning,
    Error,

    ConnectionStateChanged,
    EntityChanged,
}

impl EventKind {
    /// Parent node, `None` for the root
    pub fn parent(self) -> Option<EventKind> {
        use EventKind::*;

        match self {
            Any => None,
            Status | Favorite | Follow | DirectMessage | Message | ConnectionStateChanged
            | EntityChanged => Some(Any),
            StatusReceived | Mention | StatusDeleted => Some(Status),
            DirectMessageReceived | DirectMessageFetched => Some(DirectMessage),
            Info | Warning | Error => Some(Message),
        }
    }

    /// Whether `self` is `ancestor` or one of its descendants
    pub fn is_a(self, ancestor: EventKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == ancestor {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    pub fn as_str(self) -> &'static str {
        use EventKind::*;

        match self {
            Any => "any",
            Status => "status",
            StatusReceived => "status_received",
            Mention => "mention",
            StatusDeleted => "status_deleted",
            Favorite => "favorite",
            Follow => "follow",
            DirectMessage => "direct_message",
            DirectMessageReceived => "direct_message_received",
            DirectMessageFetched => "direct_message_fetched",
            Message => "message",
            Info => "info",
            Warning => "warning",
            Error => "error",
            ConnectionStateChanged => "connection_state_changed",
            EntityChanged => "entity_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of the streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Backoff,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Backoff => "backoff",
        };
        f.write_str(name)
    }
}

/// Which direct message list a poll covered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDirection {
    Received,
    Sent,
}

impl PollDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Sent => "sent",
        }
    }
}

/// Kind of cached entity named by [`Event::EntityChanged`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Account,
    List,
    Status,
}

/// One observed change
#[derive(Debug, Clone)]
pub enum Event {
    StatusReceived {
        status: Arc<Status>,
        author: Arc<Account>,
    },
    /// A status that references the authenticated account's handle
    Mention {
        status: Arc<Status>,
        author: Arc<Account>,
    },
    StatusDeleted {
        status_id: u64,
    },
    Favorite {
        source: Arc<Account>,
        target: Arc<Status>,
        authenticating_user_id: u64,
    },
    Follow {
        source: Arc<Account>,
        target: Arc<Account>,
    },
    DirectMessageReceived {
        collocutor_id: u64,
        message: Arc<DirectMessage>,
    },
    DirectMessageFetched {
        direction: PollDirection,
    },
    Info(String),
    Warning(String),
    Error(String),
    ConnectionStateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    EntityChanged {
        kind: EntityKind,
        id: u64,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StatusReceived { .. } => EventKind::StatusReceived,
            Event::Mention { .. } => EventKind::Mention,
            Event::StatusDeleted { .. } => EventKind::StatusDeleted,
            Event::Favorite { .. } => EventKind::Favorite,
            Event::Follow { .. } => EventKind::Follow,
            Event::DirectMessageReceived { .. } => EventKind::DirectMessageReceived,
            Event::DirectMessageFetched { .. } => EventKind::DirectMessageFetched,
            Event::Info(_) => EventKind::Info,
            Event::Warning(_) => EventKind::Warning,
            Event::Error(_) => EventKind::Error,
            Event::ConnectionStateChanged { .. } => EventKind::ConnectionStateChanged,
            Event::EntityChanged { .. } => EventKind::EntityChanged,
        }
    }

    /// Text of an informational, warning, or error message
    pub fn message(&self) -> Option<&str> {
        match self {
            Event::Info(text) | Event::Warning(text) | Event::Error(text) => Some(text),
            _ => None,
        }
    }
}
