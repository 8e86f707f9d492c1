use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, LinkPreviewOptions, MessageId, ParseMode,
    Recipient,
};

use crate::error::Error;
use crate::platform::{Action, ChannelInfo, ChannelRef, MemberStatus, Outbound, Platform};
use crate::relay::{CallbackReply, Relay};

/// Teloxide-backed implementation of the platform surface.
pub struct TelegramPlatform {
    bot: Bot,
    storage_channel: i64,
}

impl TelegramPlatform {
    pub fn new(bot: Bot, storage_channel: i64) -> Self {
        Self {
            bot,
            storage_channel,
        }
    }
}

fn recipient(channel: &ChannelRef) -> Recipient {
    match channel {
        ChannelRef::Id(id) => Recipient::Id(ChatId(*id)),
        ChannelRef::Handle(handle) => Recipient::ChannelUsername(format!("@{handle}")),
    }
}

fn classify(member: &teloxide::types::ChatMember) -> MemberStatus {
    if member.kind.is_owner() {
        MemberStatus::Owner
    } else if member.kind.is_administrator() {
        MemberStatus::Administrator
    } else if member.kind.is_restricted() {
        MemberStatus::Restricted
    } else if member.kind.is_left() {
        MemberStatus::Left
    } else if member.kind.is_banned() {
        MemberStatus::Kicked
    } else {
        MemberStatus::Member
    }
}

/// Convert actions into an inline keyboard, one button per row. Actions whose
/// URL does not parse are dropped rather than failing the whole message.
fn keyboard(actions: &[Action]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = actions
        .iter()
        .filter_map(|action| match action {
            Action::Url { label, url } => Url::parse(url)
                .ok()
                .map(|url| vec![InlineKeyboardButton::url(label.clone(), url)]),
            Action::Callback { label, data } => Some(vec![InlineKeyboardButton::callback(
                label.clone(),
                data.clone(),
            )]),
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn disabled_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

impl Platform for TelegramPlatform {
    fn copy_to_storage(
        &self,
        source_chat: i64,
        item_id: i32,
        storage_channel: i64,
    ) -> Pin<Box<dyn Future<Output = Result<i32, Error>> + Send + '_>> {
        let bot = self.bot.clone();
        Box::pin(async move {
            let copied = bot
                .copy_message(
                    ChatId(storage_channel),
                    ChatId(source_chat),
                    MessageId(item_id),
                )
                .await
                .map_err(|e| Error::Platform(e.to_string()))?;
            Ok(copied.0)
        })
    }

    fn copy_from_storage(
        &self,
        storage_item_id: i32,
        target_chat: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>> {
        let bot = self.bot.clone();
        let storage_channel = self.storage_channel;
        Box::pin(async move {
            bot.copy_message(
                ChatId(target_chat),
                ChatId(storage_channel),
                MessageId(storage_item_id),
            )
            .await
            .map_err(|e| Error::Platform(e.to_string()))?;
            Ok(())
        })
    }

    fn member_status(
        &self,
        channel: &ChannelRef,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<MemberStatus, Error>> + Send + '_>> {
        let bot = self.bot.clone();
        let target = recipient(channel);
        Box::pin(async move {
            let member = bot
                .get_chat_member(target, UserId(user_id as u64))
                .await
                .map_err(|e| Error::Platform(e.to_string()))?;
            Ok(classify(&member))
        })
    }

    fn channel_info(
        &self,
        channel: &ChannelRef,
    ) -> Pin<Box<dyn Future<Output = Result<ChannelInfo, Error>> + Send + '_>> {
        let bot = self.bot.clone();
        let target = recipient(channel);
        Box::pin(async move {
            let chat = bot
                .get_chat(target)
                .await
                .map_err(|e| Error::Platform(e.to_string()))?;
            Ok(ChannelInfo {
                title: chat.title().unwrap_or_default().to_string(),
                invite_link: chat.invite_link().map(str::to_string),
                handle: chat.username().map(str::to_string),
            })
        })
    }

    fn send(
        &self,
        chat: i64,
        message: Outbound,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>> {
        let bot = self.bot.clone();
        Box::pin(async move {
            let mut request = bot.send_message(ChatId(chat), message.text.clone());
            if message.html {
                request = request.parse_mode(ParseMode::Html);
            }
            if message.disable_preview {
                request = request.link_preview_options(disabled_preview());
            }
            if !message.actions.is_empty() {
                request = request.reply_markup(keyboard(&message.actions));
            }
            request.await.map_err(|e| Error::Platform(e.to_string()))?;
            Ok(())
        })
    }

    fn edit(
        &self,
        chat: i64,
        message_id: i32,
        message: Outbound,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>> {
        let bot = self.bot.clone();
        Box::pin(async move {
            let mut request =
                bot.edit_message_text(ChatId(chat), MessageId(message_id), message.text.clone());
            if message.html {
                request = request.parse_mode(ParseMode::Html);
            }
            if !message.actions.is_empty() {
                request = request.reply_markup(keyboard(&message.actions));
            }
            request.await.map_err(|e| Error::Platform(e.to_string()))?;
            Ok(())
        })
    }
}

/// Run the bot with long polling: one dispatcher with separate branches for
/// messages and callback queries.
pub async fn run(bot: Bot, relay: Arc<Relay>) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .default_handler(|_upd| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn is_upload(msg: &Message) -> bool {
    msg.document().is_some() || msg.video().is_some() || msg.audio().is_some()
}

/// Caption for an upload, falling back to the uploaded file's name.
fn display_caption(msg: &Message) -> Option<String> {
    if let Some(caption) = msg.caption() {
        return Some(caption.to_string());
    }
    if let Some(document) = msg.document() {
        return document.file_name.clone();
    }
    if let Some(video) = msg.video() {
        return video.file_name.clone();
    }
    if let Some(audio) = msg.audio() {
        return audio.file_name.clone();
    }
    None
}

/// Teloxide handler for incoming messages.
async fn handle_message(
    msg: Message,
    relay: Arc<Relay>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let chat_id = msg.chat.id.0;
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or_default();

    let result = if is_upload(&msg) {
        let caption = display_caption(&msg);
        relay
            .handle_upload(chat_id, user_id, msg.id.0, caption.as_deref())
            .await
    } else if let Some(text) = msg.text() {
        dispatch_text(&relay, chat_id, user_id, text).await
    } else {
        Ok(())
    };

    if let Err(e) = result {
        tracing::error!(chat_id, error = %e, "message handler error");
    }
    Ok(())
}

async fn dispatch_text(relay: &Relay, chat_id: i64, user_id: i64, text: &str) -> Result<(), Error> {
    let trimmed = text.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).filter(|rest| !rest.is_empty());

    match command {
        "/start" => relay.handle_start(chat_id, user_id, rest).await,
        "/mode" => relay.handle_mode(chat_id, user_id).await,
        "/done" => relay.handle_done(chat_id, user_id).await,
        "/shortener" => relay.handle_shortener_command(chat_id, user_id).await,
        _ => relay
            .handle_text(chat_id, user_id, trimmed)
            .await
            .map(|_consumed| ()),
    }
}

/// Teloxide handler for callback queries (inline keyboard presses).
async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    relay: Arc<Relay>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let chat_id = q.message.as_ref().map(|m| m.chat().id.0).unwrap_or_default();
    let message_id = q.message.as_ref().map(|m| m.id().0);
    let message_text = q
        .message
        .as_ref()
        .and_then(|m| m.regular_message())
        .and_then(|m| m.text())
        .map(str::to_string);
    let user_id = q.from.id.0 as i64;

    tracing::debug!(chat_id, data, "callback query received");

    match relay
        .handle_callback(chat_id, user_id, message_id, message_text.as_deref(), &data)
        .await
    {
        Ok(CallbackReply::Alert(text)) => {
            let _ = bot
                .answer_callback_query(q.id)
                .text(text)
                .show_alert(true)
                .await;
        }
        Ok(CallbackReply::Ack) => {
            let _ = bot.answer_callback_query(q.id).await;
        }
        Err(e) => {
            tracing::warn!(chat_id, data, error = %e, "callback handler error");
            let _ = bot.answer_callback_query(q.id).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_from_id() {
        assert_eq!(
            recipient(&ChannelRef::Id(-100123)),
            Recipient::Id(ChatId(-100123))
        );
    }

    #[test]
    fn recipient_from_handle() {
        assert_eq!(
            recipient(&ChannelRef::Handle("movies".into())),
            Recipient::ChannelUsername("@movies".into())
        );
    }

    #[test]
    fn keyboard_one_button_per_row() {
        let markup = keyboard(&[
            Action::Url {
                label: "Join".into(),
                url: "https://t.me/movies".into(),
            },
            Action::Callback {
                label: "Retry".into(),
                data: "r:home".into(),
            },
        ]);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 1);
        assert_eq!(markup.inline_keyboard[1].len(), 1);
    }

    #[test]
    fn keyboard_drops_unparsable_urls() {
        let markup = keyboard(&[Action::Url {
            label: "Join".into(),
            url: "not a url".into(),
        }]);
        assert!(markup.inline_keyboard.is_empty());
    }

    #[test]
    fn disabled_preview_is_disabled() {
        assert!(disabled_preview().is_disabled);
    }
}
