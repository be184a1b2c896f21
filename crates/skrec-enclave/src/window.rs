//! Challenge-window verification.
//!
//! Each recovery session tracks three windows. A window is established by
//! presenting a contiguous run of certified blocks:
//!
//! ```text
//!            accepted                 accepted + linked
//!   Unset ─────────────▶ Valid ◀──────────────────────┐
//!     │                    │  └───────────────────────┘
//!     │ rejected           │ rejected or unlinked
//!     ▼                    ▼
//!   Invalid ◀──────────────┘      (further blocks: Declined)
//! ```
//!
//! The baseline always advances to the presented block's hash, even when
//! the block is rejected. Once invalid with a baseline, the window declines
//! every later block without consulting the validator.

use std::fmt;

use skrec_ledger::{Block, BlockHash, ChainValidator};

/// The three recovery windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Window {
    /// Period in which the client may challenge the recovery
    ChallengeClient,
    /// Period in which the recovery request may be challenged
    ChallengeRequest,
    /// Commitment period closing the recovery
    Commitment,
}

impl Window {
    /// All windows, in protocol order.
    pub const ALL: [Window; 3] =
        [Window::ChallengeClient, Window::ChallengeRequest, Window::Commitment];

    /// Protocol name of the window.
    pub fn name(self) -> &'static str {
        match self {
            Window::ChallengeClient => "chal_window_c",
            Window::ChallengeRequest => "chal_window_req",
            Window::Commitment => "com_window",
        }
    }

    /// Whether blocks in this window carry per-entry challenge/denial checks.
    pub fn has_content_checks(self) -> bool {
        matches!(self, Window::ChallengeClient | Window::ChallengeRequest)
    }

    fn index(self) -> usize {
        match self {
            Window::ChallengeClient => 0,
            Window::ChallengeRequest => 1,
            Window::Commitment => 2,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validity of one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowStatus {
    /// No block presented yet
    #[default]
    Unset,
    /// Every presented block was certified and linked
    Valid,
    /// A presented block was rejected or broke linkage
    Invalid,
}

/// Outcome of presenting one block to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    /// Block accepted; window is valid
    Valid,
    /// Block rejected or unlinked; window is now invalid
    Invalid,
    /// Window was already invalid; block not evaluated
    Declined,
}

/// State of one window: its status and the hash of the last presented block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowState {
    status: WindowStatus,
    baseline: Option<BlockHash>,
}

impl WindowState {
    /// Current status.
    pub fn status(&self) -> WindowStatus {
        self.status
    }

    /// Hash of the last presented block.
    pub fn baseline(&self) -> Option<BlockHash> {
        self.baseline
    }

    /// Present `block` and advance the state machine.
    pub fn present<V: ChainValidator + ?Sized>(
        &mut self,
        block: &Block,
        validator: &V,
    ) -> WindowVerdict {
        if self.status == WindowStatus::Invalid && self.baseline.is_some() {
            return WindowVerdict::Declined;
        }

        let hash = block.data_hash().unwrap_or_else(|| block.recompute_data_hash());
        let accepted = validator.validate_block(block);
        let linked = match self.baseline {
            None => true,
            Some(baseline) => block.previous_hash() == Some(baseline),
        };

        self.baseline = Some(hash);

        if accepted && linked {
            self.status = WindowStatus::Valid;
            WindowVerdict::Valid
        } else {
            self.status = WindowStatus::Invalid;
            WindowVerdict::Invalid
        }
    }
}

/// The three windows of one recovery session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Windows {
    states: [WindowState; 3],
}

impl Windows {
    /// State of `window`.
    pub fn get(&self, window: Window) -> &WindowState {
        &self.states[window.index()]
    }

    /// Mutable state of `window`.
    pub fn get_mut(&mut self, window: Window) -> &mut WindowState {
        &mut self.states[window.index()]
    }

    /// Whether all three windows are valid.
    pub fn all_valid(&self) -> bool {
        self.states.iter().all(|s| s.status == WindowStatus::Valid)
    }

    /// Status of each window, in protocol order.
    pub fn statuses(&self) -> [(Window, WindowStatus); 3] {
        Window::ALL.map(|w| (w, self.get(w).status))
    }

    /// Windows that are not yet valid.
    pub fn pending(&self) -> Vec<Window> {
        Window::ALL.into_iter().filter(|w| self.get(*w).status != WindowStatus::Valid).collect()
    }
}
