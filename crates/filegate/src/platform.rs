use std::future::Future;
use std::pin::Pin;

use crate::error::Error;

/// A configured channel: numeric chat id or public `@handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(i64),
    Handle(String),
}

impl ChannelRef {
    /// Parse a configuration entry: `@handle` or a numeric chat id.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let raw = raw.trim();
        if let Some(handle) = raw.strip_prefix('@') {
            if handle.is_empty() {
                return Err(Error::Config("empty channel handle".into()));
            }
            return Ok(Self::Handle(handle.to_string()));
        }
        raw.parse::<i64>().map(Self::Id).map_err(|_| {
            Error::Config(format!(
                "invalid channel '{raw}': expected @handle or numeric chat id"
            ))
        })
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Handle(handle) => write!(f, "@{handle}"),
        }
    }
}

/// Membership status of a user in a channel, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    /// Whether this status counts as membership for gating purposes.
    pub fn allows_access(self) -> bool {
        matches!(self, Self::Owner | Self::Administrator | Self::Member)
    }
}

/// Channel metadata used to build a join affordance.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub title: String,
    pub invite_link: Option<String>,
    pub handle: Option<String>,
}

impl ChannelInfo {
    /// URL a user can follow to join, preferring the invite link over the
    /// public handle. `None` when the channel exposes neither.
    pub fn join_url(&self) -> Option<String> {
        if let Some(link) = &self.invite_link {
            return Some(link.clone());
        }
        self.handle
            .as_ref()
            .map(|h| format!("https://t.me/{}", h.trim_start_matches('@')))
    }
}

/// One inline action attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Url { label: String, url: String },
    Callback { label: String, data: String },
}

/// An outbound message: text plus rendering flags and inline actions.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub text: String,
    pub html: bool,
    pub disable_preview: bool,
    pub actions: Vec<Action>,
}

impl Outbound {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: false,
            disable_preview: false,
            actions: Vec::new(),
        }
    }

    /// HTML-rendered message with link previews off.
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: true,
            disable_preview: true,
            actions: Vec::new(),
        }
    }

    pub fn without_preview(mut self) -> Self {
        self.disable_preview = true;
        self
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }
}

/// The messaging-platform surface the relay depends on.
///
/// Uses `Pin<Box<dyn Future>>` for dyn-compatibility. The teloxide
/// implementation lives in the `telegram` module; tests supply fakes.
pub trait Platform: Send + Sync {
    /// Re-host an uploaded item into the storage channel, returning the
    /// storage-side item id.
    fn copy_to_storage(
        &self,
        source_chat: i64,
        item_id: i32,
        storage_channel: i64,
    ) -> Pin<Box<dyn Future<Output = Result<i32, Error>> + Send + '_>>;

    /// Re-deliver a stored item to a target chat.
    fn copy_from_storage(
        &self,
        storage_item_id: i32,
        target_chat: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>>;

    fn member_status(
        &self,
        channel: &ChannelRef,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<MemberStatus, Error>> + Send + '_>>;

    fn channel_info(
        &self,
        channel: &ChannelRef,
    ) -> Pin<Box<dyn Future<Output = Result<ChannelInfo, Error>> + Send + '_>>;

    fn send(
        &self,
        chat: i64,
        message: Outbound,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>>;

    fn edit(
        &self,
        chat: i64,
        message_id: i32,
        message: Outbound,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numeric_id() {
        assert_eq!(
            ChannelRef::parse("-1001234567890").unwrap(),
            ChannelRef::Id(-1001234567890)
        );
    }

    #[test]
    fn parse_handle() {
        assert_eq!(
            ChannelRef::parse("@movies").unwrap(),
            ChannelRef::Handle("movies".into())
        );
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(
            ChannelRef::parse("  @movies ").unwrap(),
            ChannelRef::Handle("movies".into())
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ChannelRef::parse("movies").is_err());
        assert!(ChannelRef::parse("@").is_err());
        assert!(ChannelRef::parse("").is_err());
    }

    #[test]
    fn display_roundtrip() {
        assert_eq!(ChannelRef::Id(-100).to_string(), "-100");
        assert_eq!(ChannelRef::Handle("movies".into()).to_string(), "@movies");
    }

    #[test]
    fn member_status_access() {
        assert!(MemberStatus::Owner.allows_access());
        assert!(MemberStatus::Administrator.allows_access());
        assert!(MemberStatus::Member.allows_access());
        assert!(!MemberStatus::Restricted.allows_access());
        assert!(!MemberStatus::Left.allows_access());
        assert!(!MemberStatus::Kicked.allows_access());
    }

    #[test]
    fn join_url_prefers_invite_link() {
        let info = ChannelInfo {
            title: "Movies".into(),
            invite_link: Some("https://t.me/+abc".into()),
            handle: Some("movies".into()),
        };
        assert_eq!(info.join_url().as_deref(), Some("https://t.me/+abc"));
    }

    #[test]
    fn join_url_falls_back_to_handle() {
        let info = ChannelInfo {
            title: "Movies".into(),
            invite_link: None,
            handle: Some("movies".into()),
        };
        assert_eq!(info.join_url().as_deref(), Some("https://t.me/movies"));
    }

    #[test]
    fn join_url_none_without_metadata() {
        let info = ChannelInfo {
            title: "Movies".into(),
            invite_link: None,
            handle: None,
        };
        assert!(info.join_url().is_none());
    }

    #[test]
    fn outbound_builders() {
        let msg = Outbound::plain("hi").without_preview();
        assert!(!msg.html);
        assert!(msg.disable_preview);
        assert!(msg.actions.is_empty());

        let msg = Outbound::html("<b>hi</b>");
        assert!(msg.html);
        assert!(msg.disable_preview);
    }
}
