// Command token arbitration. The host re-delivers its whole property bag on any change,
// so a command only counts the first time its token differs from the slot's last value.
// See DESIGN.md: arbiter

use crate::types::CommandToken;

/// Which command a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSlot {
    Start,
    Pause,
    Stop,
}

/// Last-seen token per command slot.
#[derive(Debug, Clone, Default)]
pub struct TokenArbiter {
    start: Option<CommandToken>,
    pause: Option<CommandToken>,
    stop: Option<CommandToken>,
}

impl TokenArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records the token iff it is non-empty and differs
    /// from the slot's stored value.
    pub fn accept(&mut self, slot: TokenSlot, incoming: Option<&str>) -> bool {
        let incoming = match incoming {
            Some(token) if !token.is_empty() => token,
            _ => return false,
        };

        let stored = self.slot_mut(slot);
        if stored.as_ref().map(CommandToken::as_str) == Some(incoming) {
            return false;
        }

        *stored = Some(CommandToken::new(incoming));
        true
    }

    /// The start token of the current playback session.
    pub fn active_start(&self) -> Option<&CommandToken> {
        self.start.as_ref()
    }

    /// True if `token` belongs to the current playback session.
    pub fn is_active_session(&self, token: &str) -> bool {
        self.start.as_ref().map(CommandToken::as_str) == Some(token)
    }

    /// Record a start token minted locally (autoplay).
    pub fn record_start(&mut self, token: CommandToken) {
        self.start = Some(token);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn slot_mut(&mut self, slot: TokenSlot) -> &mut Option<CommandToken> {
        match slot {
            TokenSlot::Start => &mut self.start,
            TokenSlot::Pause => &mut self.pause,
            TokenSlot::Stop => &mut self.stop,
        }
    }
}
