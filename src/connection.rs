//! The wire I/O facade: two independent connections to the same display.
//!
//! Framing, the auth handshake, and read buffering are handled by
//! [`x11rb::rust_connection::RustConnection`] itself. This module is only
//! the thin pairing type that owns both handles plus the screen they
//! agree on.

use x11rb::rust_connection::RustConnection;

use crate::error::CompositorError;

/// Which of the two connections a caller means. Mirrors the split in the
/// design: the event connection owns Damage objects (creation is coupled to
/// event subscription), everything else is issued on the request connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Event,
    Request,
}

/// Two logical connections to the same X display, opened independently so
/// that the request connection can be driven synchronously (send, then
/// block for the matching reply) while the event connection is drained by
/// the main loop without interference from reply traffic.
pub struct ConnectionPair {
    pub event: RustConnection,
    pub request: RustConnection,
    pub screen_num: usize,
}

impl ConnectionPair {
    /// Opens both connections to `display` (`None` means `$DISPLAY`). Each
    /// connection performs its own full authentication handshake; the
    /// screen index is taken from whichever connection answers, and both
    /// are expected to report the same one since they name the same
    /// display.
    pub fn open(display: Option<&str>) -> Result<Self, CompositorError> {
        let (event, event_screen) = RustConnection::connect(display)?;
        let (request, request_screen) = RustConnection::connect(display)?;
        debug_assert_eq!(
            event_screen, request_screen,
            "both connections must agree on the screen for the same display"
        );
        Ok(Self {
            event,
            request,
            screen_num: event_screen,
        })
    }

    pub fn conn(&self, role: Role) -> &RustConnection {
        match role {
            Role::Event => &self.event,
            Role::Request => &self.request,
        }
    }
}
