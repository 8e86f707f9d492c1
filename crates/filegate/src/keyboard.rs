use crate::error::Error;
use crate::platform::Action;

/// Retry payload used when a denial was not tied to a specific token.
pub const HOME: &str = "home";

/// Parsed callback data from an inline keyboard button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Membership re-check: `r:{token}` or `r:home`.
    Recheck { token: Option<String> },
    /// One-shot link shortening: `s:{token}`.
    Shorten { token: String },
}

/// Build the retry affordance carried on a denial prompt.
pub fn retry_button(token: Option<&str>) -> Action {
    Action::Callback {
        label: "🔄 Try Again".into(),
        data: format!("r:{}", token.unwrap_or(HOME)),
    }
}

/// Build the one-shot shorten affordance attached to a single-mode reply.
pub fn shorten_button(token: &str) -> Action {
    Action::Callback {
        label: "✂️ Shorten link".into(),
        data: format!("s:{token}"),
    }
}

/// Parse a callback_data string into a `CallbackAction`.
pub fn parse_callback_data(data: &str) -> Result<CallbackAction, Error> {
    match data.split_once(':') {
        Some(("r", payload)) if !payload.is_empty() => Ok(CallbackAction::Recheck {
            token: (payload != HOME).then(|| payload.to_string()),
        }),
        Some(("s", payload)) if !payload.is_empty() => Ok(CallbackAction::Shorten {
            token: payload.to_string(),
        }),
        _ => Err(Error::Platform(format!("unknown callback data: {data}"))),
    }
}
