//! Compositor bootstrap: redirect subwindows, acquire the overlay,
//! create our own 32-bit-depth child of it, and make both input-transparent.

use x11rb::connection::Connection;
use x11rb::protocol::composite::{ConnectionExt as _, Redirect};
use x11rb::protocol::render::{ConnectionExt as _, CreatePictureAux, Picture};
use x11rb::protocol::shape::{ClipOrdering, ConnectionExt as _, SK, SO};
use x11rb::protocol::xproto::{
    ChangeWindowAttributesAux, Colormap, ColormapAlloc, ConnectionExt as _, CreateGCAux,
    CreateWindowAux, EventMask, Gcontext, VisualClass, Visualid, Window, WindowClass,
};

use crate::connection::ConnectionPair;
use crate::error::CompositorError;
use crate::formats::PictureFormats;

/// Everything created during bootstrap that the core owns for the lifetime
/// of the process and must tear down on shutdown.
pub struct Overlays {
    pub root: Window,
    /// The server-supplied composite overlay window.
    pub server_overlay: Window,
    /// The core's own 32-bit-depth child of `server_overlay`.
    pub child_overlay: Window,
    pub child_overlay_picture: Picture,
    pub colormap: Colormap,
    pub gc: Gcontext,
    pub width: u16,
    pub height: u16,
}

fn find_argb32_visual(screen: &x11rb::protocol::xproto::Screen) -> Result<Visualid, CompositorError> {
    screen
        .allowed_depths
        .iter()
        .find(|d| d.depth == 32)
        .and_then(|d| d.visuals.iter().find(|v| v.class == VisualClass::TRUE_COLOR))
        .map(|v| v.visual_id)
        .ok_or_else(|| {
            CompositorError::ModelInconsistency(
                "no 32-bit-depth TrueColor visual advertised by the screen".to_string(),
            )
        })
}

/// Installs an empty input region on `window` via Shape's `rectangles`
/// request: an empty rectangle list makes the window click-through.
fn make_input_transparent(
    conn: &x11rb::rust_connection::RustConnection,
    window: Window,
) -> Result<(), CompositorError> {
    conn.shape_rectangles(
        SO::SET,
        SK::INPUT,
        ClipOrdering::UNSORTED,
        window,
        0,
        0,
        &[],
    )?
    .check()?;
    Ok(())
}

/// Runs the full bootstrap sequence and returns the resources created. All
/// requests are issued on the request connection except the
/// substructure-notify subscription, which must be set on the event
/// connection so the dispatcher observes it.
pub fn bootstrap(conns: &ConnectionPair, formats: &PictureFormats) -> Result<Overlays, CompositorError> {
    let request = &conns.request;
    let event = &conns.event;
    let setup = request.setup();
    let screen = &setup.roots[conns.screen_num];
    let root = screen.root;

    // 1. Redirect all current and future children of the root to offscreen
    // storage. Manual: the server must never repaint the overlay itself.
    request
        .composite_redirect_subwindows(root, Redirect::MANUAL)?
        .check()?;

    // 2. Acquire (and implicitly map) the composite overlay window. Select
    // Exposure on it via the event connection so the dispatcher's repaint
    // on overlay-expose ever actually fires — the server only delivers
    // Expose events to a client that asked for them.
    let server_overlay = request.composite_get_overlay_window(root)?.reply()?.overlay_win;
    event
        .change_window_attributes(
            server_overlay,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::EXPOSURE),
        )?
        .check()?;

    // 3. Create our own 32-bit-depth child of the overlay, full root size.
    let visual = find_argb32_visual(screen)?;
    let colormap = request.generate_id()?;
    request
        .create_colormap(ColormapAlloc::NONE, colormap, root, visual)?
        .check()?;

    let child_overlay = request.generate_id()?;
    let aux = CreateWindowAux::new()
        .background_pixel(0x0000_0000)
        .border_pixel(0x0000_0000)
        .colormap(colormap);
    request
        .create_window(
            32,
            child_overlay,
            server_overlay,
            0,
            0,
            screen.width_in_pixels,
            screen.height_in_pixels,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &aux,
        )?
        .check()?;
    // Exposure must be selected from the event connection, since that is
    // the one the dispatcher drains; selecting it via `request` would route
    // the events to the wrong socket.
    event
        .change_window_attributes(
            child_overlay,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::EXPOSURE),
        )?
        .check()?;

    // 4. Create a Render picture for the child overlay.
    let format = formats.for_visual(visual).ok_or_else(|| {
        CompositorError::ModelInconsistency(
            "no Render picture format advertised for the overlay's 32-bit visual".to_string(),
        )
    })?;
    let child_overlay_picture = request.generate_id()?;
    request
        .render_create_picture(
            child_overlay_picture,
            child_overlay,
            format,
            &CreatePictureAux::new(),
        )?
        .check()?;

    let gc = request.generate_id()?;
    request
        .create_gc(
            gc,
            child_overlay,
            &CreateGCAux::new().foreground(0x0000_0000).graphics_exposures(0),
        )?
        .check()?;

    // 5. Both overlays must be click-through.
    make_input_transparent(request, server_overlay)?;
    make_input_transparent(request, child_overlay)?;

    // 6. Subscribe to substructure-notify on the event connection — this is
    // a compositor, not a window manager, so substructure-redirect is
    // deliberately not requested.
    event
        .change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_NOTIFY),
        )?
        .check()?;

    // 7. Map the child overlay.
    request.map_window(child_overlay)?.check()?;

    // 8. Stamp ICCCM/EWMH identity properties.
    stamp_identity_properties(request, child_overlay)?;

    request.flush()?;

    Ok(Overlays {
        root,
        server_overlay,
        child_overlay,
        child_overlay_picture,
        colormap,
        gc,
        width: screen.width_in_pixels,
        height: screen.height_in_pixels,
    })
}

fn stamp_identity_properties(
    conn: &x11rb::rust_connection::RustConnection,
    window: Window,
) -> Result<(), CompositorError> {
    let net_wm_pid = conn.intern_atom(false, b"_NET_WM_PID")?.reply()?.atom;
    let wm_client_machine = conn.intern_atom(false, b"WM_CLIENT_MACHINE")?.reply()?.atom;

    let pid = std::process::id();
    conn.change_property32(
        x11rb::protocol::xproto::PropMode::REPLACE,
        window,
        net_wm_pid,
        x11rb::protocol::xproto::AtomEnum::CARDINAL,
        &[pid],
    )?
    .check()?;

    let hostname = local_hostname();
    conn.change_property8(
        x11rb::protocol::xproto::PropMode::REPLACE,
        window,
        wm_client_machine,
        x11rb::protocol::xproto::AtomEnum::STRING,
        hostname.as_bytes(),
    )?
    .check()?;

    Ok(())
}

/// The local host name, for `WM_CLIENT_MACHINE`. Falls back to `"localhost"`
/// if the system call fails, rather than making identity-stamping fatal.
fn local_hostname() -> String {
    let mut buf = [0u8; 256];
    // Safety: `buf` is a valid, correctly-sized buffer for `gethostname(2)`.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}
