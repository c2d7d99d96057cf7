//! The event dispatcher: the main loop. Reads one complete event at a
//! time from the event connection, mutates the scene model, allocates or
//! frees the per-window resources the event implies, and repaints when the
//! event calls for it. All model mutation for an event completes before
//! paint is issued, so paint always observes a consistent scene.

use tracing::{debug, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::damage::{ConnectionExt as _, ReportLevel};
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::protocol::xproto::{ConnectionExt as _, Place};
use x11rb::protocol::Event;

use crate::bootstrap::Overlays;
use crate::connection::ConnectionPair;
use crate::error::CompositorError;
use crate::formats::PictureFormats;
use crate::repaint;
use crate::scene::Scene;

/// Runs until the event connection's socket closes (clean shutdown) or an
/// unrecoverable error occurs. The caller distinguishes the two by
/// inspecting the `Ok`/`Err` result; a clean EOF is reported as `Ok(())`.
pub fn run(
    conns: &ConnectionPair,
    scene: &mut Scene,
    overlays: &Overlays,
    formats: &PictureFormats,
) -> Result<(), CompositorError> {
    loop {
        let event = match conns.event.wait_for_event() {
            Ok(event) => event,
            Err(x11rb::errors::ConnectionError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                debug!(target: "compman", "event connection closed, shutting down");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        dispatch(conns, scene, overlays, formats, event)?;
    }
}

fn dispatch(
    conns: &ConnectionPair,
    scene: &mut Scene,
    overlays: &Overlays,
    formats: &PictureFormats,
    event: Event,
) -> Result<(), CompositorError> {
    match event {
        Event::Error(err) => {
            tracing::error!(target: "compman", error = ?err, "server reported a protocol error");
            Err(CompositorError::ServerError(err.error_kind))
        }

        Event::CreateNotify(e) => {
            trace!(target: "compman", window = e.window, parent = e.parent, "create-notify");
            scene
                .on_create_notify(e.parent, e.window, e.x, e.y, e.width, e.height)
                .map_err(CompositorError::ModelInconsistency)?;
            let damage = conns.event.generate_id()?;
            conns
                .event
                .damage_create(damage, e.window, ReportLevel::NON_EMPTY)?
                .check()?;
            scene.set_damage(e.window, damage);
            Ok(())
        }

        Event::DestroyNotify(e) => {
            trace!(target: "compman", window = e.window, "destroy-notify");
            let freed = scene
                .on_destroy_notify(e.window)
                .map_err(CompositorError::ModelInconsistency)?;
            if let Some(picture) = freed.picture {
                conns.request.render_free_picture(picture)?.check()?;
            }
            if let Some(region) = freed.region {
                conns.request.xfixes_destroy_region(region)?.check()?;
            }
            if let Some(damage) = freed.damage {
                conns.event.damage_destroy(damage)?.check()?;
            }
            Ok(())
        }

        Event::MapNotify(e) => {
            trace!(target: "compman", window = e.window, "map-notify");
            scene
                .on_map_notify(e.window)
                .map_err(CompositorError::ModelInconsistency)?;
            let attrs = conns.request.get_window_attributes(e.window)?.reply()?;
            let format = formats.for_visual(attrs.visual).ok_or_else(|| {
                CompositorError::ModelInconsistency(format!(
                    "no Render picture format for window {:#x}'s visual {:#x}",
                    e.window, attrs.visual
                ))
            })?;
            let picture = conns.request.generate_id()?;
            conns
                .request
                .render_create_picture(
                    picture,
                    e.window,
                    format,
                    &x11rb::protocol::render::CreatePictureAux::new(),
                )?
                .check()?;
            scene.set_picture(e.window, picture);
            repaint::repaint(conns, scene, overlays)
        }

        Event::UnmapNotify(e) => {
            trace!(target: "compman", window = e.window, "unmap-notify");
            scene
                .on_unmap_notify(e.window)
                .map_err(CompositorError::ModelInconsistency)?;
            repaint::repaint(conns, scene, overlays)
        }

        Event::ConfigureNotify(e) => {
            trace!(target: "compman", window = e.window, "configure-notify");
            // `above_sibling` is `0` (no window) when the configure moved
            // this window to the bottom of its siblings.
            let above_sibling = if e.above_sibling == 0 {
                None
            } else {
                Some(e.above_sibling)
            };
            scene
                .on_configure_notify(e.window, e.x, e.y, e.width, e.height, above_sibling)
                .map_err(CompositorError::ModelInconsistency)?;
            let region = conns.request.generate_id()?;
            conns
                .request
                .xfixes_create_region_from_window(
                    region,
                    e.window,
                    x11rb::protocol::shape::SK::BOUNDING,
                )?
                .check()?;
            if let Some(prior) = scene.set_region(e.window, region) {
                conns.request.xfixes_destroy_region(prior)?.check()?;
            }
            repaint::repaint(conns, scene, overlays)
        }

        Event::ReparentNotify(e) => {
            trace!(target: "compman", window = e.window, new_parent = e.parent, "reparent-notify");
            scene
                .on_reparent_notify(e.window, e.parent, e.x, e.y)
                .map_err(CompositorError::ModelInconsistency)?;
            Ok(())
        }

        Event::CirculateNotify(e) => {
            trace!(target: "compman", window = e.window, "circulate-notify");
            scene
                .on_circulate_notify(e.window, e.place == Place::TOP)
                .map_err(CompositorError::ModelInconsistency)?;
            Ok(())
        }

        Event::GravityNotify(e) => {
            trace!(target: "compman", window = e.window, "gravity-notify");
            repaint::repaint(conns, scene, overlays)
        }

        Event::Expose(e) if e.window == overlays.server_overlay || e.window == overlays.child_overlay => {
            trace!(target: "compman", window = e.window, "expose on overlay");
            repaint::repaint(conns, scene, overlays)
        }

        Event::DamageNotify(e) => {
            trace!(target: "compman", drawable = e.drawable, "damage-notify");
            repaint::repaint(conns, scene, overlays)?;
            if let Some(damage) = scene.damage(e.drawable) {
                repaint::subtract_damage(conns, damage)?;
            }
            Ok(())
        }

        other => {
            warn!(target: "compman", event = ?other, "unhandled event, ignoring");
            Ok(())
        }
    }
}
