//! Damage/repaint engine: bottom-to-top Render compositing onto the
//! overlay picture, re-arming whichever window's damage triggered the pass.

use x11rb::protocol::damage::{ConnectionExt as _, Damage};
use x11rb::protocol::render::{ConnectionExt as _, PictOp};
use x11rb::protocol::xproto::{ConnectionExt as _, Rectangle};

use crate::bootstrap::Overlays;
use crate::connection::ConnectionPair;
use crate::error::CompositorError;
use crate::scene::Scene;

/// Render `composite` is used instead of `copy_area` because it tolerates
/// source/destination depth mismatches and honors alpha.
pub fn repaint(conns: &ConnectionPair, scene: &Scene, overlays: &Overlays) -> Result<(), CompositorError> {
    let request = &conns.request;

    // Clear the overlay first so unmapped/removed windows don't leave stale
    // pixels behind; this repaints whole windows per notification rather
    // than scoping to the damaged sub-area (see DESIGN.md).
    request
        .poly_fill_rectangle(
            overlays.child_overlay,
            overlays.gc,
            &[Rectangle {
                x: 0,
                y: 0,
                width: overlays.width,
                height: overlays.height,
            }],
        )?
        .check()?;

    for window in scene.forest().iter() {
        if window == overlays.root {
            continue;
        }
        let Some(record) = scene.window(window) else {
            continue;
        };
        if !record.visible {
            continue;
        }
        let Some(picture) = scene.picture(window) else {
            continue;
        };
        request
            .render_composite(
                PictOp::OVER,
                picture,
                0, // mask = None
                overlays.child_overlay_picture,
                0,
                0,
                0,
                0,
                record.x,
                record.y,
                record.width,
                record.height,
            )?
            .check()?;
    }

    request.flush()?;
    Ok(())
}

/// Re-arms `damage` after a repaint pass triggered by its notify event.
/// `repair`/`parts` are both `None` (0): subtract the whole tracked region
/// rather than scoping to a sub-area.
pub fn subtract_damage(conns: &ConnectionPair, damage: Damage) -> Result<(), CompositorError> {
    conns.event.damage_subtract(damage, 0, 0)?.check()?;
    conns.event.flush()?;
    Ok(())
}
