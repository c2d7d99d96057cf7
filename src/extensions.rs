//! Extension negotiation: `QueryExtension` + `QueryVersion` for the five
//! extensions the core relies on, run on every connection that will issue
//! requests of that extension.

use x11rb::connection::Connection;
use x11rb::protocol::composite::ConnectionExt as _;
use x11rb::protocol::damage::ConnectionExt as _;
use x11rb::protocol::render::ConnectionExt as _;
use x11rb::protocol::shape::ConnectionExt as _;
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use crate::error::{CompositorError, ExtensionName};

/// Opcode + base event/error codes for one negotiated extension.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionDescriptor {
    pub name: ExtensionName,
    pub major_opcode: u8,
    pub first_event: u8,
    pub first_error: u8,
}

/// The five extensions the core depends on, queried and version-checked
/// once per connection that uses them.
pub struct ExtensionSet {
    pub composite: ExtensionDescriptor,
    pub shape: ExtensionDescriptor,
    pub render: ExtensionDescriptor,
    pub damage: ExtensionDescriptor,
    pub xfixes: ExtensionDescriptor,
}

/// `(major, minor)` version requirement. A reported version satisfies a
/// requirement iff it has the same major and an equal-or-greater minor; any
/// other major is fatal, whether newer or older.
fn version_satisfies(required: (u32, u32), got: (u32, u32)) -> bool {
    got.0 == required.0 && got.1 >= required.1
}

fn query_extension(
    conn: &RustConnection,
    name: ExtensionName,
    wire_name: &'static [u8],
) -> Result<ExtensionDescriptor, CompositorError> {
    let reply = conn.query_extension(wire_name)?.reply()?;
    if !reply.present {
        return Err(CompositorError::ExtensionVersion {
            extension: name,
            required: (0, 0),
            got: None,
        });
    }
    Ok(ExtensionDescriptor {
        name,
        major_opcode: reply.major_opcode,
        first_event: reply.first_event,
        first_error: reply.first_error,
    })
}

/// Queries, on `conn`, the extension named `wire_name`, then requires its
/// version to satisfy `required` via the extension-specific `query_version`
/// closure. Returns the extension descriptor on success.
fn negotiate_one(
    conn: &RustConnection,
    name: ExtensionName,
    wire_name: &'static [u8],
    required: (u32, u32),
    query_version: impl FnOnce(&RustConnection) -> Result<(u32, u32), CompositorError>,
) -> Result<ExtensionDescriptor, CompositorError> {
    let descriptor = query_extension(conn, name, wire_name)?;
    let got = query_version(conn)?;
    if !version_satisfies(required, got) {
        return Err(CompositorError::ExtensionVersion {
            extension: name,
            required,
            got: Some(got),
        });
    }
    Ok(descriptor)
}

/// Required minimum versions for each extension.
pub const COMPOSITE_MIN: (u32, u32) = (0, 3);
pub const SHAPE_MIN: (u32, u32) = (1, 1);
pub const RENDER_MIN: (u32, u32) = (0, 11);
pub const DAMAGE_MIN: (u32, u32) = (1, 1);
pub const XFIXES_MIN: (u32, u32) = (2, 0);

/// Negotiates all five extensions on `conn`. `QueryVersion` is issued on
/// every connection that will later issue requests of that extension, so
/// the caller is expected to call this once per connection role and keep
/// whichever descriptors that role needs.
pub fn negotiate_all(conn: &RustConnection) -> Result<ExtensionSet, CompositorError> {
    let composite = negotiate_one(conn, ExtensionName::Composite, b"Composite", COMPOSITE_MIN, |c| {
        let r = c.composite_query_version(COMPOSITE_MIN.0, COMPOSITE_MIN.1)?.reply()?;
        Ok((r.major_version, r.minor_version))
    })?;
    let shape = negotiate_one(conn, ExtensionName::Shape, b"SHAPE", SHAPE_MIN, |c| {
        let r = c.shape_query_version()?.reply()?;
        Ok((r.major_version as u32, r.minor_version as u32))
    })?;
    let render = negotiate_one(conn, ExtensionName::Render, b"RENDER", RENDER_MIN, |c| {
        let r = c.render_query_version(RENDER_MIN.0, RENDER_MIN.1)?.reply()?;
        Ok((r.major_version, r.minor_version))
    })?;
    let damage = negotiate_one(conn, ExtensionName::Damage, b"DAMAGE", DAMAGE_MIN, |c| {
        let r = c.damage_query_version(DAMAGE_MIN.0, DAMAGE_MIN.1)?.reply()?;
        Ok((r.major_version, r.minor_version))
    })?;
    let xfixes = negotiate_one(conn, ExtensionName::XFixes, b"XFIXES", XFIXES_MIN, |c| {
        let r = c.xfixes_query_version(XFIXES_MIN.0, XFIXES_MIN.1)?.reply()?;
        Ok((r.major_version, r.minor_version))
    })?;
    Ok(ExtensionSet {
        composite,
        shape,
        render,
        damage,
        xfixes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_major_newer_minor_satisfies() {
        assert!(version_satisfies((0, 3), (0, 4)));
    }

    #[test]
    fn same_major_equal_minor_satisfies() {
        assert!(version_satisfies((1, 1), (1, 1)));
    }

    #[test]
    fn same_major_older_minor_fails() {
        assert!(!version_satisfies((1, 1), (1, 0)));
    }

    #[test]
    fn newer_major_fails() {
        assert!(!version_satisfies((0, 3), (1, 0)));
    }

    #[test]
    fn older_major_fails() {
        assert!(!version_satisfies((2, 0), (1, 9)));
    }
}
