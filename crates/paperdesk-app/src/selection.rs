// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

/// Read-only view of the table widget's native multi-selection.
pub trait SelectionQuery {
    fn is_selected(&self, index: usize) -> bool;
    fn selected(&self) -> BTreeSet<usize>;
}

/// Sticky per-row checkboxes. Independent of the native selection, which it
/// only reads when asked for bulk targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionReconciler {
    checked: BTreeSet<usize>,
}

impl SelectionReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, index: usize) -> bool {
        if self.checked.remove(&index) {
            false
        } else {
            self.checked.insert(index);
            true
        }
    }

    pub fn is_checked(&self, index: usize) -> bool {
        self.checked.contains(&index)
    }

    pub fn checked(&self) -> &BTreeSet<usize> {
        &self.checked
    }

    pub fn bulk_targets(&self, native: &dyn SelectionQuery) -> BTreeSet<usize> {
        self.checked.union(&native.selected()).copied().collect()
    }

    pub fn clear(&mut self) {
        self.checked.clear();
    }
}

/// Filters `records` by exclusion in one pass, keeping survivors in order.
pub fn retain_survivors<T: Clone>(records: &[T], targets: &BTreeSet<usize>) -> Vec<T> {
    records
        .iter()
        .enumerate()
        .filter(|(index, _)| !targets.contains(index))
        .map(|(_, record)| record.clone())
        .collect()
}

/// Cursor plus range selection, the way a list widget tracks it natively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSelection {
    cursor: Option<usize>,
    anchor: Option<usize>,
    selected: BTreeSet<usize>,
}

impl RowSelection {
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn select_only(&mut self, index: usize) {
        self.cursor = Some(index);
        self.anchor = Some(index);
        self.selected = BTreeSet::from([index]);
    }

    /// Moves the cursor by `delta`. With `extend`, the selection grows into
    /// the range between the anchor and the new cursor.
    pub fn move_cursor(&mut self, delta: isize, len: usize, extend: bool) {
        if len == 0 {
            self.clear();
            return;
        }
        let next = match self.cursor {
            Some(current) => (current as isize + delta).clamp(0, len as isize - 1) as usize,
            None => 0,
        };
        if !extend {
            self.select_only(next);
            return;
        }
        let anchor = self.anchor.unwrap_or(next);
        self.cursor = Some(next);
        self.anchor = Some(anchor);
        self.selected = (anchor.min(next)..=anchor.max(next)).collect();
    }

    pub fn clear(&mut self) {
        self.cursor = None;
        self.anchor = None;
        self.selected.clear();
    }

    /// Drops everything past the end of a list that shrank.
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.clear();
            return;
        }
        self.selected.retain(|index| *index < len);
        self.cursor = self.cursor.map(|cursor| cursor.min(len - 1));
        self.anchor = self.anchor.map(|anchor| anchor.min(len - 1));
        if self.selected.is_empty() {
            if let Some(cursor) = self.cursor {
                self.selected.insert(cursor);
            }
        }
    }
}

impl SelectionQuery for RowSelection {
    fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    fn selected(&self) -> BTreeSet<usize> {
        self.selected.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{RowSelection, SelectionQuery, SelectionReconciler, retain_survivors};
    use std::collections::BTreeSet;

    #[test]
    fn toggle_flips_only_checked_membership() {
        let mut native = RowSelection::default();
        native.select_only(2);
        let mut reconciler = SelectionReconciler::new();
        assert!(reconciler.toggle(4));
        assert!(!reconciler.toggle(4));
        assert!(reconciler.toggle(1));
        assert_eq!(reconciler.checked(), &BTreeSet::from([1]));
        assert!(native.is_selected(2));
    }

    #[test]
    fn bulk_targets_is_the_union_of_both_sets() {
        let mut native = RowSelection::default();
        native.select_only(0);
        native.move_cursor(1, 5, true);
        let mut reconciler = SelectionReconciler::new();
        reconciler.toggle(1);
        reconciler.toggle(3);
        assert_eq!(reconciler.bulk_targets(&native), BTreeSet::from([0, 1, 3]));
    }

    #[test]
    fn clear_leaves_native_selection_alone() {
        let mut native = RowSelection::default();
        native.select_only(1);
        let mut reconciler = SelectionReconciler::new();
        reconciler.toggle(2);
        reconciler.clear();
        assert!(reconciler.checked().is_empty());
        assert_eq!(native.selected(), BTreeSet::from([1]));
    }

    #[test]
    fn retain_survivors_filters_by_original_index() {
        let items = vec!["a", "b", "c", "d", "e"];
        assert_eq!(
            retain_survivors(&items, &BTreeSet::from([1, 3])),
            vec!["a", "c", "e"]
        );
        assert_eq!(retain_survivors(&items, &BTreeSet::new()), items);
    }

    #[test]
    fn extended_selection_spans_anchor_to_cursor() {
        let mut native = RowSelection::default();
        native.move_cursor(1, 4, false);
        assert_eq!(native.cursor(), Some(0));
        native.move_cursor(2, 4, true);
        assert_eq!(native.selected(), BTreeSet::from([0, 1, 2]));
        native.move_cursor(-1, 4, true);
        assert_eq!(native.selected(), BTreeSet::from([0, 1]));
        native.move_cursor(1, 4, false);
        assert_eq!(native.selected(), BTreeSet::from([2]));
    }

    #[test]
    fn clamp_drops_rows_past_the_end() {
        let mut native = RowSelection::default();
        native.select_only(3);
        native.clamp(2);
        assert_eq!(native.cursor(), Some(1));
        assert_eq!(native.selected(), BTreeSet::from([1]));
        native.clamp(0);
        assert_eq!(native.cursor(), None);
    }
}
