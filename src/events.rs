use serde::{Deserialize, Serialize};

/// Environment signals that drive the activation state machine. Each
/// variant that needs one carries the already-resolved address of the
/// active tab, as delivered by the browser side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A different tab became the active one.
    TabActivated { url: Option<String> },
    /// The active tab finished loading a new address.
    NavigationCompleted { url: String },
    /// Browser window focus moved; `None` means no window is focused.
    WindowFocusChanged { url: Option<String> },
    /// The user went idle/locked or came back.
    IdleStateChanged { state: IdleState, url: Option<String> },
    /// Periodic wake-up, no activation change.
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

/// Side effects requested by the engine. The engine only describes what
/// should happen; dispatching is the boundary's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show the one-shot limit notification for a domain.
    Notify { domain: String, limit_minutes: i64 },
    /// Turn on the persistent alert indicator.
    SetAlertBadge,
    /// Clear the alert indicator.
    ClearBadge,
}
