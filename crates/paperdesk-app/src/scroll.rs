// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PaneId(usize);

/// Horizontal scroll surface of a host. Writes through `set_scroll_left`
/// may notify the synchronizer again; echoes of its own writes are dropped.
pub trait ScrollHost {
    fn parent(&self, pane: PaneId) -> Option<PaneId>;
    fn children(&self, pane: PaneId) -> Vec<PaneId>;
    fn scroll_left(&self, pane: PaneId) -> u16;
    fn set_scroll_left(&mut self, pane: PaneId, value: u16);
}

#[derive(Debug, Clone, Default)]
struct Pane {
    parent: Option<PaneId>,
    children: Vec<PaneId>,
    scroll_left: u16,
    max_scroll: u16,
}

/// A small retained pane tree that records every scroll change as an event.
#[derive(Debug, Clone, Default)]
pub struct PaneTree {
    panes: Vec<Pane>,
    events: Vec<PaneId>,
}

impl PaneTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self) -> PaneId {
        self.push(Pane::default())
    }

    pub fn add_child(&mut self, parent: PaneId) -> PaneId {
        let child = self.push(Pane {
            parent: Some(parent),
            ..Pane::default()
        });
        if let Some(pane) = self.panes.get_mut(parent.0) {
            pane.children.push(child);
        }
        child
    }

    pub fn set_max_scroll(&mut self, pane: PaneId, max_scroll: u16) {
        let Some(entry) = self.panes.get_mut(pane.0) else {
            return;
        };
        entry.max_scroll = max_scroll;
        if entry.scroll_left > max_scroll {
            entry.scroll_left = max_scroll;
            self.events.push(pane);
        }
    }

    /// User-initiated scroll. Returns whether the offset changed.
    pub fn scroll_by(&mut self, pane: PaneId, delta: i32) -> bool {
        let Some(entry) = self.panes.get(pane.0) else {
            return false;
        };
        let next = (i32::from(entry.scroll_left) + delta).clamp(0, i32::from(entry.max_scroll));
        let changed = next != i32::from(entry.scroll_left);
        if changed {
            self.set_scroll_left(pane, next as u16);
        }
        changed
    }

    pub fn take_scroll_events(&mut self) -> Vec<PaneId> {
        std::mem::take(&mut self.events)
    }

    fn push(&mut self, pane: Pane) -> PaneId {
        self.panes.push(pane);
        PaneId(self.panes.len() - 1)
    }
}

impl ScrollHost for PaneTree {
    fn parent(&self, pane: PaneId) -> Option<PaneId> {
        self.panes.get(pane.0).and_then(|entry| entry.parent)
    }

    fn children(&self, pane: PaneId) -> Vec<PaneId> {
        self.panes
            .get(pane.0)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    fn scroll_left(&self, pane: PaneId) -> u16 {
        self.panes.get(pane.0).map_or(0, |entry| entry.scroll_left)
    }

    fn set_scroll_left(&mut self, pane: PaneId, value: u16) {
        let Some(entry) = self.panes.get_mut(pane.0) else {
            return;
        };
        let value = value.min(entry.max_scroll);
        if entry.scroll_left != value {
            entry.scroll_left = value;
            self.events.push(pane);
        }
    }
}

/// Keeps sibling panes inside registered containers at the same horizontal
/// offset. Scroll notifications are queued into one pending frame; the
/// frame is flushed by the host once per tick.
#[derive(Debug, Clone, Default)]
pub struct ScrollSynchronizer {
    containers: BTreeSet<PaneId>,
    pending: Option<PaneId>,
    echoes: BTreeMap<PaneId, u16>,
}

impl ScrollSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a container. Returns false when it was already attached.
    pub fn attach(&mut self, container: PaneId) -> bool {
        self.containers.insert(container)
    }

    pub fn is_attached(&self, container: PaneId) -> bool {
        self.containers.contains(&container)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Handles a scroll notification for `target`. Returns whether a frame
    /// is now scheduled for it.
    pub fn on_scroll(&mut self, host: &dyn ScrollHost, target: PaneId) -> bool {
        if let Some(written) = self.echoes.remove(&target) {
            if written == host.scroll_left(target) {
                return false;
            }
        }
        if !self.contains(host, target) {
            return false;
        }
        self.pending = Some(target);
        true
    }

    /// Runs the pending frame, copying the source offset to its siblings.
    /// Returns how many panes were written.
    pub fn run_frame(&mut self, host: &mut dyn ScrollHost) -> usize {
        let Some(source) = self.pending.take() else {
            return 0;
        };
        let Some(parent) = host.parent(source) else {
            return 0;
        };
        let value = host.scroll_left(source);
        let mut written = 0;
        for sibling in host.children(parent) {
            if sibling == source || host.scroll_left(sibling) == value {
                continue;
            }
            host.set_scroll_left(sibling, value);
            self.echoes.insert(sibling, host.scroll_left(sibling));
            written += 1;
        }
        if written > 0 {
            tracing::trace!(written, value, "scroll offsets synchronized");
        }
        written
    }

    fn contains(&self, host: &dyn ScrollHost, target: PaneId) -> bool {
        let mut cursor = host.parent(target);
        while let Some(pane) = cursor {
            if self.containers.contains(&pane) {
                return true;
            }
            cursor = host.parent(pane);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{PaneId, PaneTree, ScrollHost, ScrollSynchronizer};

    struct Fixture {
        tree: PaneTree,
        container: PaneId,
        header: PaneId,
        body: PaneId,
    }

    fn fixture() -> Fixture {
        let mut tree = PaneTree::new();
        let container = tree.add_root();
        let header = tree.add_child(container);
        let body = tree.add_child(container);
        tree.set_max_scroll(header, 40);
        tree.set_max_scroll(body, 40);
        Fixture {
            tree,
            container,
            header,
            body,
        }
    }

    fn pump(sync: &mut ScrollSynchronizer, tree: &mut PaneTree) {
        for pane in tree.take_scroll_events() {
            sync.on_scroll(&*tree, pane);
        }
    }

    #[test]
    fn attach_is_idempotent() {
        let Fixture { container, .. } = fixture();
        let mut sync = ScrollSynchronizer::new();
        assert!(sync.attach(container));
        assert!(!sync.attach(container));
        assert!(sync.is_attached(container));
    }

    #[test]
    fn body_scroll_propagates_to_header_once_per_frame() {
        let Fixture {
            mut tree,
            container,
            header,
            body,
        } = fixture();
        let mut sync = ScrollSynchronizer::new();
        sync.attach(container);

        tree.scroll_by(body, 4);
        tree.scroll_by(body, 4);
        pump(&mut sync, &mut tree);
        assert!(sync.has_pending());
        assert_eq!(tree.scroll_left(header), 0);

        assert_eq!(sync.run_frame(&mut tree), 1);
        assert_eq!(tree.scroll_left(header), 8);
        assert!(!sync.has_pending());
    }

    #[test]
    fn synchronized_writes_do_not_echo_back() {
        let Fixture {
            mut tree,
            container,
            header,
            body,
        } = fixture();
        let mut sync = ScrollSynchronizer::new();
        sync.attach(container);

        tree.scroll_by(header, 6);
        pump(&mut sync, &mut tree);
        sync.run_frame(&mut tree);
        assert_eq!(tree.scroll_left(body), 6);

        pump(&mut sync, &mut tree);
        assert!(!sync.has_pending(), "write to body must not schedule a frame");
        assert_eq!(sync.run_frame(&mut tree), 0);
    }

    #[test]
    fn panes_outside_registered_containers_are_ignored() {
        let Fixture {
            mut tree, header, ..
        } = fixture();
        let mut sync = ScrollSynchronizer::new();
        tree.scroll_by(header, 3);
        pump(&mut sync, &mut tree);
        assert!(!sync.has_pending());
    }

    #[test]
    fn equal_offsets_are_not_rewritten() {
        let Fixture {
            mut tree,
            container,
            header,
            body,
        } = fixture();
        let mut sync = ScrollSynchronizer::new();
        sync.attach(container);
        tree.set_scroll_left(header, 5);
        tree.set_scroll_left(body, 5);
        tree.take_scroll_events();
        sync.on_scroll(&tree, body);
        assert_eq!(sync.run_frame(&mut tree), 0);
    }

    #[test]
    fn nested_descendants_sync_with_their_own_siblings() {
        let mut tree = PaneTree::new();
        let container = tree.add_root();
        let wrapper = tree.add_child(container);
        let left = tree.add_child(wrapper);
        let right = tree.add_child(wrapper);
        tree.set_max_scroll(left, 10);
        tree.set_max_scroll(right, 10);
        let mut sync = ScrollSynchronizer::new();
        sync.attach(container);

        tree.scroll_by(left, 7);
        pump(&mut sync, &mut tree);
        sync.run_frame(&mut tree);
        assert_eq!(tree.scroll_left(right), 7);
    }
}
