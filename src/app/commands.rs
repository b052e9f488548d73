//! Inbound commands to the gate.
//!
//! These represent actions requested by the outside world (buttons, the
//! command pipe, the radio receiver behind the analog microcontroller).
//! Every producer hands in raw text; only members of the closed vocabulary
//! below ever reach the [`CommandQueue`](super::queue::CommandQueue).

use core::fmt;

/// Operating mode of the gate, persisted across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperatingMode {
    /// Normal cycling; the default after a missing or corrupt mode file.
    #[default]
    NormalHome,
    /// Normal cycling while the owners are away.
    NormalAway,
    /// Gate is driven closed and ignores open/close until the mode changes.
    LockClosed,
    /// Gate is driven open and ignores open/close until the mode changes.
    LockOpen,
}

impl OperatingMode {
    pub const ALL: [Self; 4] = [
        Self::NormalHome,
        Self::NormalAway,
        Self::LockClosed,
        Self::LockOpen,
    ];

    /// Persisted / wire token.
    pub const fn token(self) -> &'static str {
        match self {
            Self::NormalHome => "normal_home",
            Self::NormalAway => "normal_away",
            Self::LockClosed => "lock_closed",
            Self::LockOpen => "lock_open",
        }
    }

    /// Exact, case-sensitive token match.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.token() == token)
    }

    /// One of the `normal_*` modes, in which open/close commands cycle the gate.
    pub const fn is_normal(self) -> bool {
        matches!(self, Self::NormalHome | Self::NormalAway)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A validated queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Open,
    Close,
    Mode(OperatingMode),
}

impl Command {
    /// Parse raw producer input: surrounding whitespace and newlines are
    /// stripped, then the token must match the vocabulary exactly.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "open" => Some(Self::Open),
            "close" => Some(Self::Close),
            token => OperatingMode::from_token(token).map(Self::Mode),
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Mode(mode) => mode.token(),
        }
    }

    pub const fn is_mode(self) -> bool {
        matches!(self, Self::Mode(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
