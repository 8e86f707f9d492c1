use crate::keyboard;
use crate::platform::{Action, ChannelRef, Platform};

/// Outcome of a membership evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Satisfied,
    Denied,
}

/// Decides whether a user may receive content, given required channel
/// memberships. Stateless between evaluations: every check re-queries the
/// platform.
pub struct MembershipGate {
    admin_id: i64,
    channels: Vec<ChannelRef>,
}

impl MembershipGate {
    pub fn new(admin_id: i64, channels: Vec<ChannelRef>) -> Self {
        Self { admin_id, channels }
    }

    /// Evaluate membership for a user.
    ///
    /// The admin and an empty channel set short-circuit to `Satisfied` with
    /// no lookups. Policy: a failed lookup denies; the gate fails closed,
    /// never open.
    pub async fn check(&self, platform: &dyn Platform, user_id: i64) -> GateDecision {
        if user_id == self.admin_id {
            return GateDecision::Satisfied;
        }
        if self.channels.is_empty() {
            return GateDecision::Satisfied;
        }

        for channel in &self.channels {
            match platform.member_status(channel, user_id).await {
                Ok(status) if status.allows_access() => {}
                Ok(status) => {
                    tracing::debug!(%channel, user_id, ?status, "membership denied");
                    return GateDecision::Denied;
                }
                Err(e) => {
                    // Fail closed: a channel the bot cannot read (or lacks
                    // rights in) denies instead of waving the user through.
                    tracing::warn!(%channel, user_id, error = %e, "membership lookup failed");
                    return GateDecision::Denied;
                }
            }
        }
        GateDecision::Satisfied
    }

    /// Build the join-prompt actions shown on denial: one join button per
    /// introspectable channel plus one retry button carrying the token.
    ///
    /// Channels whose metadata cannot be retrieved are omitted from the
    /// prompt, not treated as fatal.
    pub async fn join_actions(&self, platform: &dyn Platform, token: Option<&str>) -> Vec<Action> {
        let mut actions = Vec::new();
        for channel in &self.channels {
            match platform.channel_info(channel).await {
                Ok(info) => {
                    if let Some(url) = info.join_url() {
                        actions.push(Action::Url {
                            label: format!("Join {}", info.title),
                            url,
                        });
                    }
                }
                Err(e) => {
                    tracing::debug!(%channel, error = %e, "channel info unavailable");
                }
            }
        }
        actions.push(keyboard::retry_button(token));
        actions
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::Error;
    use crate::platform::{ChannelInfo, MemberStatus, Outbound};

    /// Scripted platform fake: statuses and infos keyed by channel display.
    #[derive(Default)]
    struct FakePlatform {
        statuses: RwLock<HashMap<String, MemberStatus>>,
        infos: RwLock<HashMap<String, ChannelInfo>>,
        lookups: AtomicUsize,
    }

    impl FakePlatform {
        fn with_status(self, channel: &str, status: MemberStatus) -> Self {
            self.statuses
                .write()
                .unwrap()
                .insert(channel.to_string(), status);
            self
        }

        fn with_info(self, channel: &str, info: ChannelInfo) -> Self {
            self.infos
                .write()
                .unwrap()
                .insert(channel.to_string(), info);
            self
        }
    }

    impl Platform for FakePlatform {
        fn copy_to_storage(
            &self,
            _source_chat: i64,
            item_id: i32,
            _storage_channel: i64,
        ) -> Pin<Box<dyn Future<Output = Result<i32, Error>> + Send + '_>> {
            Box::pin(async move { Ok(item_id) })
        }

        fn copy_from_storage(
            &self,
            _storage_item_id: i32,
            _target_chat: i64,
        ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }

        fn member_status(
            &self,
            channel: &ChannelRef,
            _user_id: i64,
        ) -> Pin<Box<dyn Future<Output = Result<MemberStatus, Error>> + Send + '_>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let result = self
                .statuses
                .read()
                .unwrap()
                .get(&channel.to_string())
                .copied()
                .ok_or_else(|| Error::Platform("member lookup failed".into()));
            Box::pin(async move { result })
        }

        fn channel_info(
            &self,
            channel: &ChannelRef,
        ) -> Pin<Box<dyn Future<Output = Result<ChannelInfo, Error>> + Send + '_>> {
            let result = self
                .infos
                .read()
                .unwrap()
                .get(&channel.to_string())
                .cloned()
                .ok_or_else(|| Error::Platform("get chat failed".into()));
            Box::pin(async move { result })
        }

        fn send(
            &self,
            _chat: i64,
            _message: Outbound,
        ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }

        fn edit(
            &self,
            _chat: i64,
            _message_id: i32,
            _message: Outbound,
        ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
    }

    const ADMIN: i64 = 7;

    fn channels(refs: &[&str]) -> Vec<ChannelRef> {
        refs.iter().map(|r| ChannelRef::parse(r).unwrap()).collect()
    }

    #[tokio::test]
    async fn admin_short_circuits_without_lookups() {
        let platform = FakePlatform::default();
        let gate = MembershipGate::new(ADMIN, channels(&["@movies"]));
        assert_eq!(gate.check(&platform, ADMIN).await, GateDecision::Satisfied);
        assert_eq!(platform.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_channel_set_satisfies_anyone() {
        let platform = FakePlatform::default();
        let gate = MembershipGate::new(ADMIN, Vec::new());
        assert_eq!(gate.check(&platform, 999).await, GateDecision::Satisfied);
        assert_eq!(platform.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn member_of_all_channels_satisfied() {
        let platform = FakePlatform::default()
            .with_status("@a", MemberStatus::Member)
            .with_status("@b", MemberStatus::Administrator);
        let gate = MembershipGate::new(ADMIN, channels(&["@a", "@b"]));
        assert_eq!(gate.check(&platform, 999).await, GateDecision::Satisfied);
        assert_eq!(platform.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn left_status_denies() {
        let platform = FakePlatform::default().with_status("@a", MemberStatus::Left);
        let gate = MembershipGate::new(ADMIN, channels(&["@a"]));
        assert_eq!(gate.check(&platform, 999).await, GateDecision::Denied);
    }

    #[tokio::test]
    async fn restricted_status_denies() {
        let platform = FakePlatform::default().with_status("@a", MemberStatus::Restricted);
        let gate = MembershipGate::new(ADMIN, channels(&["@a"]));
        assert_eq!(gate.check(&platform, 999).await, GateDecision::Denied);
    }

    #[tokio::test]
    async fn lookup_error_fails_closed() {
        // No scripted status -> the fake errors, which must deny.
        let platform = FakePlatform::default();
        let gate = MembershipGate::new(ADMIN, channels(&["@a"]));
        assert_eq!(gate.check(&platform, 999).await, GateDecision::Denied);
    }

    #[tokio::test]
    async fn one_bad_channel_among_good_denies() {
        let platform = FakePlatform::default()
            .with_status("@a", MemberStatus::Member)
            .with_status("@b", MemberStatus::Kicked);
        let gate = MembershipGate::new(ADMIN, channels(&["@a", "@b"]));
        assert_eq!(gate.check(&platform, 999).await, GateDecision::Denied);
    }

    #[tokio::test]
    async fn join_actions_include_retry_with_token() {
        let platform = FakePlatform::default().with_info(
            "@a",
            ChannelInfo {
                title: "Movies".into(),
                invite_link: Some("https://t.me/+abc".into()),
                handle: None,
            },
        );
        let gate = MembershipGate::new(ADMIN, channels(&["@a"]));
        let actions = gate.join_actions(&platform, Some("tok123")).await;
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            Action::Url {
                label: "Join Movies".into(),
                url: "https://t.me/+abc".into()
            }
        );
        assert_eq!(
            actions[1],
            Action::Callback {
                label: "🔄 Try Again".into(),
                data: "r:tok123".into()
            }
        );
    }

    #[tokio::test]
    async fn uninspectable_channels_silently_omitted() {
        let platform = FakePlatform::default().with_info(
            "@a",
            ChannelInfo {
                title: "Movies".into(),
                invite_link: None,
                handle: Some("movies".into()),
            },
        );
        // "@ghost" has no info scripted: the lookup errors and the channel
        // is left out; the retry button must still be present, alone at the
        // end.
        let gate = MembershipGate::new(ADMIN, channels(&["@a", "@ghost"]));
        let actions = gate.join_actions(&platform, None).await;
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], Action::Url { label, .. } if label == "Join Movies"));
        assert!(matches!(&actions[1], Action::Callback { data, .. } if data == "r:home"));
    }

    #[tokio::test]
    async fn channel_without_link_or_handle_omitted() {
        let platform = FakePlatform::default().with_info(
            "@a",
            ChannelInfo {
                title: "Movies".into(),
                invite_link: None,
                handle: None,
            },
        );
        let gate = MembershipGate::new(ADMIN, channels(&["@a"]));
        let actions = gate.join_actions(&platform, None).await;
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], Action::Callback { .. }));
    }
}
