//! The scene model: window table, resource maps, and the stacking
//! forest, kept consistent with the server after every dispatched event.

pub mod forest;
pub mod window;

use std::collections::HashMap;

use x11rb::protocol::damage::Damage;
use x11rb::protocol::render::Picture;
use x11rb::protocol::xfixes::Region;
use x11rb::protocol::xproto::Window;

pub use forest::Placement;
use forest::StackingForest;
pub use window::WindowRecord;

/// Resources freed as part of tearing a window down on destroy-notify.
/// The caller issues the matching `Free`/`Destroy` requests; the scene
/// model only hands back what it was holding.
#[derive(Debug, Default)]
pub struct FreedResources {
    pub picture: Option<Picture>,
    pub region: Option<Region>,
    pub damage: Option<Damage>,
}

/// Everything the core tracks about the live scene: the window table, the
/// stacking forest, and the three window-keyed resource maps. Owns all
/// four collections outright; the server owns the resource IDs themselves,
/// and this struct is only responsible for issuing the matching free on
/// destroy.
pub struct Scene {
    windows: HashMap<Window, WindowRecord>,
    forest: StackingForest,
    picture_map: HashMap<Window, Picture>,
    region_map: HashMap<Window, Region>,
    damage_map: HashMap<Window, Damage>,
}

impl Scene {
    pub fn new(root: Window) -> Self {
        Self {
            windows: HashMap::new(),
            forest: StackingForest::new(root),
            picture_map: HashMap::new(),
            region_map: HashMap::new(),
            damage_map: HashMap::new(),
        }
    }

    pub fn root(&self) -> Window {
        self.forest.root_window()
    }

    pub fn forest(&self) -> &StackingForest {
        &self.forest
    }

    pub fn window(&self, window: Window) -> Option<&WindowRecord> {
        self.windows.get(&window)
    }

    pub fn picture(&self, window: Window) -> Option<Picture> {
        self.picture_map.get(&window).copied()
    }

    pub fn damage(&self, window: Window) -> Option<Damage> {
        self.damage_map.get(&window).copied()
    }

    /// create-notify: insert the window record (unmapped), append it at the
    /// top of its parent's siblings. Damage-object creation is a connection
    /// side effect owned by the caller.
    pub fn on_create_notify(
        &mut self,
        parent: Window,
        window: Window,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
    ) -> Result<(), String> {
        self.windows.insert(window, WindowRecord::new(window, x, y, width, height));
        self.forest.append_new_child(parent, window)
    }

    /// destroy-notify: remove the window and its stack node, and hand back
    /// whatever resources were mapped to it for the caller to free.
    pub fn on_destroy_notify(&mut self, window: Window) -> Result<FreedResources, String> {
        self.windows.remove(&window);
        self.forest.remove(window)?;
        Ok(FreedResources {
            picture: self.picture_map.remove(&window),
            region: self.region_map.remove(&window),
            damage: self.damage_map.remove(&window),
        })
    }

    /// map-notify: mark visible. Picture creation is a connection side
    /// effect the caller performs and records via [`Scene::set_picture`].
    pub fn on_map_notify(&mut self, window: Window) -> Result<(), String> {
        let record = self
            .windows
            .get_mut(&window)
            .ok_or_else(|| format!("map-notify for unknown window {window:#x}"))?;
        record.visible = true;
        Ok(())
    }

    pub fn set_picture(&mut self, window: Window, picture: Picture) {
        self.picture_map.insert(window, picture);
    }

    pub fn set_damage(&mut self, window: Window, damage: Damage) {
        self.damage_map.insert(window, damage);
    }

    pub fn set_region(&mut self, window: Window, region: Region) -> Option<Region> {
        self.region_map.insert(window, region)
    }

    /// unmap-notify: mark invisible. The picture is retained rather than
    /// freed immediately — cheap to keep, and the window may be remapped.
    pub fn on_unmap_notify(&mut self, window: Window) -> Result<(), String> {
        let record = self
            .windows
            .get_mut(&window)
            .ok_or_else(|| format!("unmap-notify for unknown window {window:#x}"))?;
        record.visible = false;
        Ok(())
    }

    /// configure-notify: update geometry and restack by `above_sibling`.
    pub fn on_configure_notify(
        &mut self,
        window: Window,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        above_sibling: Option<Window>,
    ) -> Result<(), String> {
        let record = self
            .windows
            .get_mut(&window)
            .ok_or_else(|| format!("configure-notify for unknown window {window:#x}"))?;
        record.x = x;
        record.y = y;
        record.width = width;
        record.height = height;
        let placement = match above_sibling {
            None => Placement::Bottom,
            Some(sibling) => Placement::Above(sibling),
        };
        self.forest.restack(window, placement)
    }

    /// reparent-notify: move the node under its new parent, at the top.
    pub fn on_reparent_notify(
        &mut self,
        window: Window,
        new_parent: Window,
        x: i16,
        y: i16,
    ) -> Result<(), String> {
        let record = self
            .windows
            .get_mut(&window)
            .ok_or_else(|| format!("reparent-notify for unknown window {window:#x}"))?;
        record.x = x;
        record.y = y;
        self.forest.reparent(window, new_parent)
    }

    /// circulate-notify: move to the top or bottom of current siblings.
    pub fn on_circulate_notify(&mut self, window: Window, to_top: bool) -> Result<(), String> {
        let placement = if to_top { Placement::Top } else { Placement::Bottom };
        self.forest.restack(window, placement)
    }

    /// The window table's keys must equal the forest's tracked windows
    /// (plus the root, which has no table entry).
    #[cfg(test)]
    pub fn windows_match_forest(&self) -> bool {
        let mut forest_ids: std::collections::HashSet<Window> = self.forest.window_ids();
        forest_ids.remove(&self.root());
        let table_ids: std::collections::HashSet<Window> = self.windows.keys().copied().collect();
        forest_ids == table_ids
    }

    /// Every visible window has a picture.
    #[cfg(test)]
    pub fn every_visible_window_has_picture(&self) -> bool {
        self.windows
            .values()
            .filter(|w| w.visible)
            .all(|w| self.picture_map.contains_key(&w.window_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: Window = 1;
    const A: Window = 2;

    #[test]
    fn create_then_map_keeps_invariants() {
        let mut scene = Scene::new(ROOT);
        scene.on_create_notify(ROOT, A, 0, 0, 100, 100).unwrap();
        assert!(scene.windows_match_forest());
        scene.on_map_notify(A).unwrap();
        scene.set_picture(A, 42);
        assert!(scene.windows_match_forest());
        assert!(scene.every_visible_window_has_picture());
    }

    #[test]
    fn destroy_while_damage_pending_frees_resources_and_drops_from_forest() {
        let mut scene = Scene::new(ROOT);
        scene.on_create_notify(ROOT, A, 0, 0, 100, 100).unwrap();
        scene.set_damage(A, 7);
        scene.on_map_notify(A).unwrap();
        scene.set_picture(A, 42);
        scene.set_region(A, 99);

        let freed = scene.on_destroy_notify(A).unwrap();
        assert_eq!(freed.picture, Some(42));
        assert_eq!(freed.region, Some(99));
        assert_eq!(freed.damage, Some(7));
        assert!(scene.window(A).is_none());
        assert!(!scene.forest().contains(A));
        assert!(scene.windows_match_forest());
    }

    #[test]
    fn configure_notify_creates_fresh_region_and_replaces_prior() {
        let mut scene = Scene::new(ROOT);
        scene.on_create_notify(ROOT, A, 0, 0, 100, 100).unwrap();
        let prior = scene.set_region(A, 1);
        assert_eq!(prior, None);
        let prior = scene.set_region(A, 2);
        assert_eq!(prior, Some(1));
    }

    #[test]
    fn unmap_retains_picture() {
        let mut scene = Scene::new(ROOT);
        scene.on_create_notify(ROOT, A, 0, 0, 100, 100).unwrap();
        scene.on_map_notify(A).unwrap();
        scene.set_picture(A, 5);
        scene.on_unmap_notify(A).unwrap();
        assert_eq!(scene.picture(A), Some(5));
        assert!(!scene.window(A).unwrap().visible);
    }
}
