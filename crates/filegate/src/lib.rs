pub mod batch;
pub mod caption;
pub mod config;
pub mod error;
pub mod gate;
pub mod keyboard;
pub mod platform;
pub mod relay;
pub mod session;
pub mod shortener;
pub mod telegram;
pub mod token;

pub use batch::{BatchStore, FileRecord, RenderUnit};
pub use config::RelayConfig;
pub use error::Error;
pub use gate::{GateDecision, MembershipGate};
pub use keyboard::CallbackAction;
pub use platform::{Action, ChannelInfo, ChannelRef, MemberStatus, Outbound, Platform};
pub use relay::{CallbackReply, Relay};
pub use session::{AdminSession, AdminSessions, RelayMode};
pub use shortener::{ShortenBackend, Shortener, ShortenerConfig};
pub use telegram::TelegramPlatform;
