//! Session-wide lifecycle.
//!
//! ```text
//!   Lobby ──start_game──→ Playing
//!     ↑                      │
//!     └──────end_game────────┘
//!
//!   any ──end(reason)──→ Ended(reason)   (terminal)
//! ```

use std::fmt;

use netlobby_protocol::EndReason;

use crate::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Lobby,
    Playing,
    Ended(EndReason),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => f.write_str("Lobby"),
            Self::Playing => f.write_str("Playing"),
            Self::Ended(reason) => write!(f, "Ended({reason})"),
        }
    }
}

/// Owns the [`SessionState`] of one session instance.
#[derive(Debug)]
pub struct Lifecycle {
    state: SessionState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: SessionState::Lobby,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, SessionState::Ended(_))
    }

    /// The reason the session ended, if it has.
    pub fn end_reason(&self) -> Option<EndReason> {
        match self.state {
            SessionState::Ended(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn start_game(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Lobby, SessionState::Playing, "start the game")
    }

    pub fn end_game(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Playing, SessionState::Lobby, "end the game")
    }

    /// Moves to `Ended(reason)`.
    ///
    /// # Errors
    /// [`SessionError::Disposed`] if the session has already ended.
    pub fn end(&mut self, reason: EndReason) -> Result<(), SessionError> {
        if self.is_ended() {
            return Err(SessionError::Disposed("session"));
        }
        tracing::info!(from = %self.state, %reason, "session ended");
        self.state = SessionState::Ended(reason);
        Ok(())
    }

    /// Whether a new machine may be approved right now.
    pub fn accepts_joiners(&self, allow_join_in_progress: bool) -> bool {
        match self.state {
            SessionState::Lobby => true,
            SessionState::Playing => allow_join_in_progress,
            SessionState::Ended(_) => false,
        }
    }

    fn transition(
        &mut self,
        from: SessionState,
        to: SessionState,
        action: &'static str,
    ) -> Result<(), SessionError> {
        if self.is_ended() {
            return Err(SessionError::Disposed("session"));
        }
        if self.state != from {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                action,
            });
        }
        tracing::info!(%from, %to, "session state changed");
        self.state = to;
        Ok(())
    }
}
