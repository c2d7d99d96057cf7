//! Entry point: opens the connection pair, negotiates extensions, runs the
//! bootstrap sequence, then drives the dispatcher until the socket closes or
//! an unrecoverable error occurs. No flags, no arguments.

mod bootstrap;
mod connection;
mod dispatcher;
mod error;
mod extensions;
mod formats;
mod repaint;
mod scene;

use std::process::ExitCode;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{
    filter::LevelFilter, fmt::time::UtcTime, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use crate::bootstrap::Overlays;
use crate::connection::{ConnectionPair, Role};
use crate::error::CompositorError;
use crate::formats::PictureFormats;
use crate::scene::Scene;

fn setup_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_file(true)
        .with_timer(UtcTime::rfc_3339())
        .with_filter(
            tracing_subscriber::filter::targets::Targets::new().with_targets([(
                "compman",
                #[cfg(debug_assertions)]
                LevelFilter::TRACE,
                #[cfg(not(debug_assertions))]
                tracing_subscriber::filter::EnvFilter::from_default_env(),
            )]),
        );
    tracing_subscriber::registry().with(fmt_layer).init();
}

/// The composition boundary: `CompositorError`'s typed taxonomy is
/// converted into `anyhow::Error` via `?`, with `anyhow::Context` layered
/// on top for the outermost diagnostics.
fn run() -> Result<()> {
    let conns = ConnectionPair::open(None)?;
    info!(target: "compman", "connected to X display, screen {}", conns.screen_num);

    // Negotiated on both connections; the descriptors themselves
    // aren't consulted again (the `Event` enum already classifies extension
    // events once a connection's internal extension-info cache is warm),
    // but the negotiation calls that populate that cache must still run
    // here, on each connection, before any event or reply of that
    // extension's kind can be parsed.
    let _event_extensions = extensions::negotiate_all(conns.conn(Role::Event))?;
    let _request_extensions = extensions::negotiate_all(conns.conn(Role::Request))?;
    info!(target: "compman", "negotiated Composite/Shape/Render/Damage/XFixes on both connections");

    let formats = PictureFormats::query(&conns.request)?;
    let overlays: Overlays = bootstrap::bootstrap(&conns, &formats)?;
    info!(
        target: "compman",
        overlay = overlays.server_overlay,
        child = overlays.child_overlay,
        "bootstrap complete"
    );

    let mut scene = Scene::new(overlays.root);

    let result = dispatcher::run(&conns, &mut scene, &overlays, &formats);
    shutdown(&conns, &overlays);
    Ok(result?)
}

/// Best-effort resource teardown: freed in reverse creation order, never
/// allowed to mask whatever error (if any) triggered the shutdown.
fn shutdown(conns: &ConnectionPair, overlays: &Overlays) {
    use x11rb::protocol::composite::{ConnectionExt as _, Redirect};
    use x11rb::protocol::render::ConnectionExt as _;
    use x11rb::protocol::xproto::ConnectionExt as _;

    let free_picture = || -> Result<(), CompositorError> {
        conns.request.render_free_picture(overlays.child_overlay_picture)?.check()?;
        Ok(())
    };
    let free_gc = || -> Result<(), CompositorError> {
        conns.request.free_gc(overlays.gc)?.check()?;
        Ok(())
    };
    let free_colormap = || -> Result<(), CompositorError> {
        conns.request.free_colormap(overlays.colormap)?.check()?;
        Ok(())
    };
    let destroy_child_overlay = || -> Result<(), CompositorError> {
        conns.request.destroy_window(overlays.child_overlay)?.check()?;
        Ok(())
    };
    // Undoes the overlay acquisition and the root redirect, in that order,
    // so the server releases the overlay and stops redirecting root
    // subwindows before the connection itself goes away.
    let release_overlay = || -> Result<(), CompositorError> {
        conns
            .request
            .composite_release_overlay_window(overlays.server_overlay)?
            .check()?;
        Ok(())
    };
    let unredirect_subwindows = || -> Result<(), CompositorError> {
        conns
            .request
            .composite_unredirect_subwindows(overlays.root, Redirect::MANUAL)?
            .check()?;
        Ok(())
    };

    if let Err(e) = free_picture() {
        error::log_cleanup_error("free child overlay picture", e);
    }
    if let Err(e) = free_gc() {
        error::log_cleanup_error("free overlay gc", e);
    }
    if let Err(e) = free_colormap() {
        error::log_cleanup_error("free overlay colormap", e);
    }
    if let Err(e) = destroy_child_overlay() {
        error::log_cleanup_error("destroy child overlay window", e);
    }
    if let Err(e) = release_overlay() {
        error::log_cleanup_error("release composite overlay window", e);
    }
    if let Err(e) = unredirect_subwindows() {
        error::log_cleanup_error("unredirect root subwindows", e);
    }
}

fn main() -> ExitCode {
    setup_tracing();

    match run() {
        Ok(()) => {
            info!(target: "compman", "shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            // The one clean-shutdown path (the event socket closing once the
            // dispatcher has seen a full, consistent event stream) is
            // already folded into `Ok(())` inside `dispatcher::run`; anything
            // reaching here is an unrecovered error.
            error!(target: "compman", error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}
