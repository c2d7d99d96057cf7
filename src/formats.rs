//! Render picture-format lookup, queried once at startup and reused for
//! every window picture the dispatcher creates, rather than re-querying
//! `query_pict_formats` per window.

use std::collections::HashMap;

use x11rb::protocol::render::{ConnectionExt as _, Pictformat};
use x11rb::protocol::xproto::Visualid;
use x11rb::rust_connection::RustConnection;

use crate::error::CompositorError;

pub struct PictureFormats {
    by_visual: HashMap<Visualid, Pictformat>,
}

impl PictureFormats {
    pub fn query(conn: &RustConnection) -> Result<Self, CompositorError> {
        let reply = conn.render_query_pict_formats()?.reply()?;
        let mut by_visual = HashMap::new();
        for screen in &reply.screens {
            for depth in &screen.depths {
                for visual_entry in &depth.visuals {
                    by_visual.insert(visual_entry.visual, visual_entry.format);
                }
            }
        }
        Ok(Self { by_visual })
    }

    pub fn for_visual(&self, visual: Visualid) -> Option<Pictformat> {
        self.by_visual.get(&visual).copied()
    }
}
