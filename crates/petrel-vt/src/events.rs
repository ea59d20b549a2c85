//! Side effects queued for the host.
//!
//! The interpreter never calls into the window system; anything the host
//! must act on is queued here and drained after each `feed`.

/// OSC 52 clipboard target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardTarget {
    Clipboard,
    Primary,
}

/// OSC 133 shell-integration markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellMarker {
    PromptStart,
    CommandStart,
    CommandFinished(Option<i32>),
}

/// One host-visible side effect of interpreting slave output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermEvent {
    Bell,
    TitleChanged(String),
    /// The application asked for the working-directory report (OSC 7).
    CwdChanged(String),
    /// OSC 52 write: decoded payload for the given target.
    ClipboardSet {
        target: ClipboardTarget,
        data: Vec<u8>,
    },
    /// OSC 52 query: the host should reply with the current clipboard via
    /// [`crate::Term::reply_clipboard`].
    ClipboardQuery {
        target: ClipboardTarget,
    },
    /// Begin synchronized update: hold presents until End or watchdog.
    SyncBegin,
    SyncEnd,
    /// A palette or dynamic color changed; a full repaint is required.
    ColorsChanged,
    /// DECSCNM toggled.
    ReverseVideoChanged(bool),
    CursorVisibilityChanged(bool),
    CursorBlinkChanged(bool),
    /// Mouse tracking or encoding changed; the host owns the pointer.
    MouseModesChanged,
    ShellIntegration(ShellMarker),
    /// OSC 777 desktop notification.
    Notify {
        summary: String,
        body: String,
    },
    /// A sixel image finished decoding and was attached to the grid.
    SixelAttached,
    /// The alternate/normal grid swap happened; selection was cleared.
    GridSwapped,
}
