//! Client-side ordering primitives: the single-step splice used by drag
//! interactions, a drag session that previews the splice live, and applying a
//! caller-supplied permutation to a list of identified items.

use std::collections::HashMap;

/// Remove the element at `from` and reinsert it so it ends up at index `to`.
/// This is a splice, not a swap: everything between the two indexes shifts by
/// one. Returns `false` (and leaves `items` alone) when the indexes are equal
/// or out of bounds.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from == to || from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

/// Rearrange `items` to follow `order`, a list of keys. Returns `None` unless
/// `order` names every item exactly once.
pub fn apply_order<T, F>(items: Vec<T>, order: &[String], key: F) -> Option<Vec<T>>
where
    F: Fn(&T) -> &str,
{
    if items.len() != order.len() {
        return None;
    }

    let mut by_key: HashMap<String, T> = HashMap::with_capacity(items.len());
    for item in items {
        let item_key = key(&item).to_string();
        if by_key.insert(item_key, item).is_some() {
            return None;
        }
    }

    let mut arranged = Vec::with_capacity(order.len());
    for wanted in order {
        arranged.push(by_key.remove(wanted)?);
    }
    Some(arranged)
}

/// A drag in progress. Every hover re-splices the preview list from the
/// grabbed item's current slot to the hovered slot, so the list on screen is
/// always what a drop would commit. Cancelling restores the order captured
/// at grab time.
#[derive(Debug, Clone)]
pub struct DragSession<T> {
    original: Vec<T>,
    preview: Vec<T>,
    origin: usize,
    current: usize,
}

impl<T: Clone> DragSession<T> {
    /// Start dragging the item at `index`. `None` if there is nothing there.
    pub fn grab(items: &[T], index: usize) -> Option<Self> {
        if index >= items.len() {
            return None;
        }
        Some(Self {
            original: items.to_vec(),
            preview: items.to_vec(),
            origin: index,
            current: index,
        })
    }

    /// Move the grabbed item over `target` (clamped to the list). Hovering
    /// its own slot is a no-op.
    pub fn hover(&mut self, target: usize) -> bool {
        let target = target.min(self.preview.len().saturating_sub(1));
        if move_item(&mut self.preview, self.current, target) {
            self.current = target;
            true
        } else {
            false
        }
    }

    /// Keyboard-sized hover: one slot up (negative) or down (positive).
    pub fn step(&mut self, offset: isize) -> bool {
        let target = (self.current as isize + offset).max(0) as usize;
        self.hover(target)
    }

    pub fn preview(&self) -> &[T] {
        &self.preview
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Whether dropping now would change the order.
    pub fn is_moved(&self) -> bool {
        self.origin != self.current
    }

    /// Commit: the order as currently previewed.
    pub fn finish(self) -> Vec<T> {
        self.preview
    }

    /// Abort: the order from before the grab.
    pub fn cancel(self) -> Vec<T> {
        self.original
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn moving_up_splices_before_target() {
        let mut items = letters(&["A", "B", "C", "D"]);
        assert!(move_item(&mut items, 2, 0));
        assert_eq!(items, letters(&["C", "A", "B", "D"]));
    }

    #[test]
    fn moving_down_lands_on_target_index() {
        let mut items = letters(&["A", "B", "C", "D"]);
        assert!(move_item(&mut items, 0, 2));
        assert_eq!(items, letters(&["B", "C", "A", "D"]));
    }

    #[test]
    fn same_index_is_a_no_op() {
        let mut items = letters(&["A", "B"]);
        assert!(!move_item(&mut items, 1, 1));
        assert!(!move_item(&mut items, 0, 5));
        assert_eq!(items, letters(&["A", "B"]));
    }

    #[test]
    fn apply_order_requires_a_permutation() {
        let items = letters(&["a", "b", "c"]);
        let reordered = apply_order(items.clone(), &letters(&["c", "a", "b"]), |s| s.as_str());
        assert_eq!(reordered, Some(letters(&["c", "a", "b"])));

        assert!(apply_order(items.clone(), &letters(&["a", "b"]), |s| s.as_str()).is_none());
        assert!(apply_order(items.clone(), &letters(&["a", "a", "b"]), |s| s.as_str()).is_none());
        assert!(apply_order(items, &letters(&["a", "b", "z"]), |s| s.as_str()).is_none());
    }

    #[test]
    fn drag_previews_each_hover_and_cancel_restores() {
        let items = letters(&["A", "B", "C", "D"]);
        let mut drag = DragSession::grab(&items, 0).unwrap();

        assert!(drag.step(1));
        assert_eq!(drag.preview(), letters(&["B", "A", "C", "D"]).as_slice());
        assert!(drag.step(1));
        assert_eq!(drag.preview(), letters(&["B", "C", "A", "D"]).as_slice());
        assert_eq!(drag.current(), 2);
        assert!(drag.is_moved());

        assert_eq!(drag.cancel(), items);
    }

    #[test]
    fn drag_hover_clamps_and_finishes() {
        let items = letters(&["A", "B", "C"]);
        let mut drag = DragSession::grab(&items, 1).unwrap();
        assert!(!drag.step(0));
        assert!(drag.step(-5));
        assert!(!drag.step(-1));
        assert!(drag.hover(10));
        assert_eq!(drag.finish(), letters(&["A", "C", "B"]));
    }

    #[test]
    fn grab_out_of_range_is_none() {
        assert!(DragSession::grab(&letters(&["A"]), 3).is_none());
    }
}
