use std::sync::Arc;

use crate::batch::{self, BatchStore, FileRecord};
use crate::caption;
use crate::config::RelayConfig;
use crate::error::Error;
use crate::gate::{GateDecision, MembershipGate};
use crate::keyboard::{self, CallbackAction};
use crate::platform::{Outbound, Platform};
use crate::session::{AdminSessions, RelayMode};
use crate::shortener::{Shortener, ShortenerConfig};
use crate::token;

/// How the transport should answer a callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackReply {
    Ack,
    Alert(String),
}

/// Ties the token codec, caption normalizer, membership gate, batch queue and
/// shortener into the bot's upload, deep-link and publish flows.
///
/// All collaborators are injected; there is no process-global state. Every
/// external-call failure is converted at its call site into a user-visible
/// reply or a logged fallback; handlers only propagate errors from their own
/// outbound sends, which the transport layer logs.
pub struct Relay {
    platform: Arc<dyn Platform>,
    config: RelayConfig,
    gate: MembershipGate,
    sessions: AdminSessions,
    batches: BatchStore,
    shortener: Shortener,
}

impl Relay {
    pub fn new(platform: Arc<dyn Platform>, config: RelayConfig) -> Result<Self, Error> {
        let shortener = Shortener::new(config.shortener.clone());
        Self::with_shortener(platform, config, shortener)
    }

    /// Constructor with an injected shortener (tests use a fake backend).
    pub fn with_shortener(
        platform: Arc<dyn Platform>,
        config: RelayConfig,
        shortener: Shortener,
    ) -> Result<Self, Error> {
        let channels = config.parse_required_channels()?;
        let gate = MembershipGate::new(config.admin_id, channels);
        Ok(Self {
            platform,
            config,
            gate,
            sessions: AdminSessions::new(),
            batches: BatchStore::new(),
            shortener,
        })
    }

    pub fn batches(&self) -> &BatchStore {
        &self.batches
    }

    pub fn sessions(&self) -> &AdminSessions {
        &self.sessions
    }

    fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.config.admin_id
    }

    /// Deep link a user follows to redeem a token.
    pub fn deep_link(&self, token: &str) -> String {
        format!("https://t.me/{}?start={}", self.config.bot_username, token)
    }

    /// Handle an admin upload: re-host into the storage channel, mint a
    /// token, then deliver the link immediately or queue it depending on the
    /// current mode.
    pub async fn handle_upload(
        &self,
        chat_id: i64,
        user_id: i64,
        item_id: i32,
        raw_caption: Option<&str>,
    ) -> Result<(), Error> {
        if !self.is_admin(user_id) {
            return self
                .platform
                .send(
                    chat_id,
                    Outbound::plain("⛔ Access denied. Only the admin can add files."),
                )
                .await;
        }

        let storage_item_id = match self
            .platform
            .copy_to_storage(chat_id, item_id, self.config.storage_channel)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(item_id, error = %e, "re-hosting upload failed");
                return self
                    .platform
                    .send(
                        chat_id,
                        Outbound::plain(
                            "❌ Storage unavailable. Check the channel id and the bot's admin rights.",
                        ),
                    )
                    .await;
            }
        };

        let access_token = token::encode(storage_item_id);
        let delivery_link = self.deep_link(&access_token);
        let normalized_caption = caption::normalize(raw_caption);

        match self.sessions.get(self.config.admin_id).mode {
            RelayMode::Single => {
                let text = format!("✅ Stored!\n📂 {normalized_caption}\n🔗 {delivery_link}");
                let reply = Outbound::plain(text)
                    .without_preview()
                    .with_actions(vec![keyboard::shorten_button(&access_token)]);
                self.platform.send(chat_id, reply).await
            }
            RelayMode::Batch => {
                let record = FileRecord {
                    raw_caption: raw_caption.map(str::to_string),
                    normalized_caption,
                    storage_item_id,
                    access_token,
                    delivery_link,
                };
                let count = self.batches.add(self.config.admin_id, record);
                self.platform
                    .send(
                        chat_id,
                        Outbound::plain(format!(
                            "📦 Added to batch ({count} pending). /done to publish."
                        )),
                    )
                    .await
            }
        }
    }

    /// Handle `/start [token]`. The gate is evaluated before the token is
    /// even decoded; a denied user sees the join prompt and no delivery is
    /// attempted.
    pub async fn handle_start(
        &self,
        chat_id: i64,
        user_id: i64,
        payload: Option<&str>,
    ) -> Result<(), Error> {
        if self.gate.check(self.platform.as_ref(), user_id).await == GateDecision::Denied {
            return self.send_join_prompt(chat_id, payload).await;
        }
        match payload {
            Some(token) => self.deliver(chat_id, token).await,
            None => self.send_greeting(chat_id, user_id).await,
        }
    }

    /// Handle an inline-keyboard callback, returning how to answer it.
    pub async fn handle_callback(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: Option<i32>,
        message_text: Option<&str>,
        data: &str,
    ) -> Result<CallbackReply, Error> {
        match keyboard::parse_callback_data(data)? {
            CallbackAction::Recheck { token } => {
                self.handle_recheck(chat_id, user_id, message_id, token.as_deref())
                    .await
            }
            CallbackAction::Shorten { token } => {
                self.handle_shorten(chat_id, user_id, message_id, message_text, &token)
                    .await
            }
        }
    }

    /// `/mode`: toggle single/batch. Entering single clears any pending
    /// batch. Silently ignored for non-admins.
    pub async fn handle_mode(&self, chat_id: i64, user_id: i64) -> Result<(), Error> {
        if !self.is_admin(user_id) {
            return Ok(());
        }
        let mode = self.sessions.toggle_mode(self.config.admin_id);
        if mode == RelayMode::Single {
            self.batches.clear(self.config.admin_id);
        }
        let hint = match mode {
            RelayMode::Single => "Files are processed immediately.",
            RelayMode::Batch => "Files are queued. /done to publish.",
        };
        self.platform
            .send(
                chat_id,
                Outbound::plain(format!("🔄 Mode changed: {}\n{hint}", mode.label())),
            )
            .await
    }

    /// `/done`: publish the batch as consolidated, caption-grouped messages.
    /// The queue is cleared exactly once, only after every group has been
    /// attempted; one group's send failure does not abort the rest.
    pub async fn handle_done(&self, chat_id: i64, user_id: i64) -> Result<(), Error> {
        if !self.is_admin(user_id) {
            return Ok(());
        }
        let records = self.batches.snapshot(self.config.admin_id);
        if records.is_empty() {
            return self
                .platform
                .send(chat_id, Outbound::plain("⚠️ No files in batch."))
                .await;
        }
        let _ = self
            .platform
            .send(chat_id, Outbound::plain("⚙️ Publishing batch…"))
            .await;

        for unit in batch::group_records(&records) {
            let text = batch::render_group(&unit);
            let links: Vec<String> = unit
                .records
                .iter()
                .map(|record| record.delivery_link.clone())
                .collect();
            let text = self.shortener.shorten_text(&text, &links).await;
            if let Err(e) = self.platform.send(chat_id, Outbound::html(text)).await {
                tracing::warn!(group = %unit.group_key, error = %e, "group publish failed");
                let _ = self
                    .platform
                    .send(
                        chat_id,
                        Outbound::plain(format!("❌ Error sending group: {}", unit.group_key)),
                    )
                    .await;
            }
        }

        self.batches.clear(self.config.admin_id);
        self.platform
            .send(chat_id, Outbound::plain("✅ Batch complete."))
            .await
    }

    /// `/shortener`: arm the awaiting-configuration flag.
    pub async fn handle_shortener_command(&self, chat_id: i64, user_id: i64) -> Result<(), Error> {
        if !self.is_admin(user_id) {
            return Ok(());
        }
        self.sessions
            .set_awaiting_shortener_config(self.config.admin_id, true);
        self.platform
            .send(
                chat_id,
                Outbound::plain("✏️ Send the shortener config as: <domain> | <key>"),
            )
            .await
    }

    /// Free text from a chat. Consumed only while the admin's
    /// awaiting-configuration flag is set; returns whether it was consumed.
    pub async fn handle_text(&self, chat_id: i64, user_id: i64, text: &str) -> Result<bool, Error> {
        if !self.is_admin(user_id)
            || !self
                .sessions
                .get(self.config.admin_id)
                .awaiting_shortener_config
        {
            return Ok(false);
        }
        match ShortenerConfig::parse(text) {
            Some(config) => {
                self.shortener.reconfigure(config);
                self.sessions
                    .set_awaiting_shortener_config(self.config.admin_id, false);
                self.platform
                    .send(chat_id, Outbound::plain("✅ Shortener configured."))
                    .await?;
            }
            None => {
                // Flag stays set so the admin can retry.
                self.platform
                    .send(
                        chat_id,
                        Outbound::plain("❌ Bad format. Expected: <domain> | <key>"),
                    )
                    .await?;
            }
        }
        Ok(true)
    }

    // --- internal flows ---

    async fn send_join_prompt(&self, chat_id: i64, token: Option<&str>) -> Result<(), Error> {
        let actions = self.gate.join_actions(self.platform.as_ref(), token).await;
        let prompt = Outbound::plain("⚠️ Access restricted.\n\nJoin the channels below, then try again.")
            .with_actions(actions);
        self.platform.send(chat_id, prompt).await
    }

    /// Decode a token and best-effort re-deliver the stored item.
    async fn deliver(&self, chat_id: i64, token: &str) -> Result<(), Error> {
        let Some(storage_item_id) = token::decode(token) else {
            return self
                .platform
                .send(chat_id, Outbound::plain("❌ Invalid link."))
                .await;
        };
        match self
            .platform
            .copy_from_storage(storage_item_id, chat_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(storage_item_id, error = %e, "stored item delivery failed");
                self.platform
                    .send(chat_id, Outbound::plain("❌ File unavailable."))
                    .await
            }
        }
    }

    async fn send_greeting(&self, chat_id: i64, user_id: i64) -> Result<(), Error> {
        let text = if self.is_admin(user_id) {
            let mode = self.sessions.get(self.config.admin_id).mode;
            format!(
                "👋 Admin panel\nCurrent mode: {}\n\n/mode — switch mode\n/done — publish batch\n/shortener — configure link shortener",
                mode.label()
            )
        } else {
            "🤖 File store bot\nSend me a valid link to get files.".to_string()
        };
        self.platform.send(chat_id, Outbound::plain(text)).await
    }

    /// Re-run the gate after the user claims to have joined. Still denied:
    /// an alert, with the prompt left in place. Satisfied: the prompt turns
    /// into a verified notice and the original request resumes.
    async fn handle_recheck(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: Option<i32>,
        token: Option<&str>,
    ) -> Result<CallbackReply, Error> {
        if self.gate.check(self.platform.as_ref(), user_id).await == GateDecision::Denied {
            return Ok(CallbackReply::Alert("⚠️ You have not joined yet!".into()));
        }
        match token {
            Some(token) => {
                if let Some(message_id) = message_id {
                    let _ = self
                        .platform
                        .edit(chat_id, message_id, Outbound::plain("✅ Verified."))
                        .await;
                }
                self.deliver(chat_id, token).await?;
            }
            None => {
                let verified = Outbound::plain("👋 Welcome! You are verified.");
                match message_id {
                    Some(id) => {
                        let _ = self.platform.edit(chat_id, id, verified).await;
                    }
                    None => self.platform.send(chat_id, verified).await?,
                }
            }
        }
        Ok(CallbackReply::Ack)
    }

    /// One-shot shorten affordance from a single-mode reply. Admin-only;
    /// silently acknowledged for anyone else. All failure modes are
    /// non-fatal: the original link keeps working.
    async fn handle_shorten(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: Option<i32>,
        message_text: Option<&str>,
        token: &str,
    ) -> Result<CallbackReply, Error> {
        if !self.is_admin(user_id) {
            return Ok(CallbackReply::Ack);
        }
        if !self.shortener.is_configured() {
            return Ok(CallbackReply::Alert(
                "Shortener not configured. Use /shortener first.".into(),
            ));
        }
        let long_link = self.deep_link(token);
        let Some(short_link) = self.shortener.shorten(&long_link).await else {
            return Ok(CallbackReply::Alert(
                "Shortening failed — the original link still works.".into(),
            ));
        };
        match (message_id, message_text) {
            (Some(message_id), Some(text)) => {
                let updated = text.replace(&long_link, &short_link);
                self.platform
                    .edit(
                        chat_id,
                        message_id,
                        Outbound::plain(updated).without_preview(),
                    )
                    .await?;
            }
            _ => {
                self.platform
                    .send(
                        chat_id,
                        Outbound::plain(format!("🔗 {short_link}")).without_preview(),
                    )
                    .await?;
            }
        }
        Ok(CallbackReply::Ack)
    }
}
