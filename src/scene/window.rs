use x11rb::protocol::xproto::Window;

/// One per top-level window observed under the root. Geometry is
/// relative to the window's parent, matching the wire representation.
#[derive(Debug, Clone, Copy)]
pub struct WindowRecord {
    pub window_id: Window,
    pub visible: bool,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl WindowRecord {
    pub fn new(window_id: Window, x: i16, y: i16, width: u16, height: u16) -> Self {
        Self {
            window_id,
            visible: false,
            x,
            y,
            width,
            height,
        }
    }
}
