//! The element tree shared by forms, modes and inputs
//!
//! Every node has an id, its own validity and its children. The aggregate
//! validity of a node is its own validity AND the aggregate of every child,
//! cached per node. Changing a leaf clears the caches on the path from the
//! root to that leaf; everything else stays cached.

use std::cell::Cell;

use uuid::Uuid;

use crate::input::Input;
use crate::modes::{AddOrChoose, OptionallyAddMultiple, View};
use crate::table_view::TableView;

/// Identity of a node in a form tree
pub type ElementId = Uuid;

/// Per-node cache of the aggregate validity
#[derive(Debug, Default)]
pub struct ValidityCache(Cell<Option<bool>>);

impl ValidityCache {
    pub fn get(&self) -> Option<bool> {
        self.0.get()
    }

    pub fn set(&self, valid: bool) {
        self.0.set(Some(valid));
    }

    pub fn clear(&self) {
        self.0.set(None);
    }
}

/// A node of a form tree
pub trait Element {
    fn id(&self) -> ElementId;

    /// Display title, e.g. "Add client"
    fn title(&self) -> String {
        String::new()
    }

    /// Validity of this node alone, ignoring children
    fn own_validity(&self) -> bool {
        true
    }

    fn children(&self) -> Vec<&dyn Element> {
        Vec::new()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Element> {
        Vec::new()
    }

    fn validity_cache(&self) -> &ValidityCache;

    fn as_input(&self) -> Option<&Input> {
        None
    }

    fn as_input_mut(&mut self) -> Option<&mut Input> {
        None
    }

    /// The listing behind View, Choose and AddOrChoose nodes
    fn as_table_view(&self) -> Option<&TableView> {
        None
    }

    fn as_table_view_mut(&mut self) -> Option<&mut TableView> {
        None
    }

    fn as_view(&self) -> Option<&View> {
        None
    }

    fn as_add_or_choose_mut(&mut self) -> Option<&mut AddOrChoose> {
        None
    }

    fn as_multiple_mut(&mut self) -> Option<&mut OptionallyAddMultiple> {
        None
    }
}

/// Aggregate validity of a subtree, filling caches on the way
pub fn aggregate_validity(element: &dyn Element) -> bool {
    if let Some(valid) = element.validity_cache().get() {
        return valid;
    }
    let valid = element.own_validity()
        && element
            .children()
            .into_iter()
            .all(aggregate_validity);
    element.validity_cache().set(valid);
    valid
}

/// Clear the caches on the path from `root` to `target`.
///
/// Returns false when `target` is not in the tree.
pub fn invalidate_path(root: &dyn Element, target: ElementId) -> bool {
    if root.id() == target {
        root.validity_cache().clear();
        return true;
    }
    for child in root.children() {
        if invalidate_path(child, target) {
            root.validity_cache().clear();
            return true;
        }
    }
    false
}

/// Find a node by id
pub fn find<'a>(root: &'a dyn Element, target: ElementId) -> Option<&'a dyn Element> {
    if root.id() == target {
        return Some(root);
    }
    root.children()
        .into_iter()
        .find_map(|child| find(child, target))
}

/// Find a node by id for mutation
pub fn find_mut<'a>(root: &'a mut dyn Element, target: ElementId) -> Option<&'a mut dyn Element> {
    if root.id() == target {
        return Some(root);
    }
    root.children_mut()
        .into_iter()
        .find_map(|child| find_mut(child, target))
}

/// Depth-first walk over a subtree, root first
pub fn walk<'a>(root: &'a dyn Element, visit: &mut dyn FnMut(&'a dyn Element)) {
    visit(root);
    for child in root.children() {
        walk(child, visit);
    }
}
