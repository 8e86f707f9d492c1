use std::collections::HashMap;
use std::sync::RwLock;

/// Delivery mode for admin uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelayMode {
    /// Every upload is answered immediately with its link.
    #[default]
    Single,
    /// Uploads accumulate until `/done` publishes them consolidated.
    Batch,
}

impl RelayMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Single => Self::Batch,
            Self::Batch => Self::Single,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Batch => "BATCH",
        }
    }
}

/// Volatile per-admin session state.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminSession {
    pub mode: RelayMode,
    pub awaiting_shortener_config: bool,
}

/// Session store keyed by admin id.
///
/// Uses `std::sync::RwLock` (never held across `.await`). Contents do not
/// survive a restart.
#[derive(Default)]
pub struct AdminSessions {
    inner: RwLock<HashMap<i64, AdminSession>>,
}

impl AdminSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, admin_id: i64) -> AdminSession {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(&admin_id).copied())
            .unwrap_or_default()
    }

    /// Flip the delivery mode, returning the new mode.
    pub fn toggle_mode(&self, admin_id: i64) -> RelayMode {
        match self.inner.write() {
            Ok(mut map) => {
                let session = map.entry(admin_id).or_default();
                session.mode = session.mode.toggled();
                session.mode
            }
            Err(_) => RelayMode::default(),
        }
    }

    pub fn set_awaiting_shortener_config(&self, admin_id: i64, awaiting: bool) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(admin_id).or_default().awaiting_shortener_config = awaiting;
        }
    }
}
