//! Parent and child grouping within one run.
//!
//! Records refer to their parent by id only. [`assemble`] resolves those ids
//! through a lookup table over an arena of the run's records; nothing holds a
//! live reference to another record.

use std::collections::HashMap;

use log::debug;

use crate::source::PlaceRecord;

/// A record and the records of the same run that name it as parent.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceHierarchy<T> {
    root: T,
    children: Vec<T>,
}

impl<T> PlaceHierarchy<T> {
    /// A hierarchy with no children.
    #[must_use]
    pub const fn new(root: T) -> Self {
        Self {
            root,
            children: Vec::new(),
        }
    }

    /// The parent record.
    #[must_use]
    pub const fn root(&self) -> &T {
        &self.root
    }

    /// Child records in input order.
    #[must_use]
    pub fn children(&self) -> &[T] {
        &self.children
    }

    /// Attach a child.
    pub fn push_child(&mut self, child: T) {
        self.children.push(child);
    }

    /// Split into the root and its children.
    #[must_use]
    pub fn into_parts(self) -> (T, Vec<T>) {
        (self.root, self.children)
    }
}

/// Group `records` into single-level hierarchies.
///
/// A record becomes a child when its parent id names another record of the
/// run that is not itself a child. Records whose parent is missing, is the
/// record itself, or is a child are kept as roots. When several records share
/// an id, the first one is the one children attach to. Groups are ordered by
/// the first record belonging to them, and children keep input order.
///
/// # Examples
/// ```
/// use kartlag_data::{GeoJsonFeature, GeoJsonOptions, SourcePlace, assemble};
///
/// let feature = |id: &str, parent: Option<&str>| {
///     let json = serde_json::json!({
///         "type": "Feature",
///         "id": id,
///         "properties": { "parentId": parent },
///     });
///     let feature: GeoJsonFeature = serde_json::from_value(json).expect("valid feature");
///     SourcePlace::from_feature(feature, &GeoJsonOptions::default()).expect("adapted")
/// };
///
/// let groups = assemble(vec![
///     feature("quay-1", Some("stop-1")),
///     feature("stop-1", None),
///     feature("quay-2", Some("elsewhere")),
/// ]);
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[0].children().len(), 1);
/// assert!(groups[1].children().is_empty());
/// ```
#[must_use]
pub fn assemble<T: PlaceRecord>(records: Vec<T>) -> Vec<PlaceHierarchy<T>> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        index.entry(record.id().to_owned()).or_insert(position);
    }

    // A parent must itself be a root, which keeps the grouping one level deep.
    let parent_of: Vec<Option<usize>> = records
        .iter()
        .enumerate()
        .map(|(position, record)| {
            record
                .parent_id()
                .and_then(|parent| index.get(parent).copied())
                .filter(|&parent| parent != position)
        })
        .collect();
    let resolved: Vec<Option<usize>> = parent_of
        .iter()
        .map(|parent| parent.filter(|&parent| parent_of[parent].is_none()))
        .collect();

    let mut slots: Vec<Option<T>> = records.into_iter().map(Some).collect();
    let mut groups: Vec<PlaceHierarchy<T>> = Vec::new();
    let mut group_of: HashMap<usize, usize> = HashMap::new();
    for position in 0..slots.len() {
        let root = match resolved[position] {
            Some(parent) => parent,
            None => position,
        };
        let group = match group_of.get(&root) {
            Some(&group) => group,
            None => {
                let Some(record) = slots[root].take() else {
                    continue;
                };
                groups.push(PlaceHierarchy::new(record));
                group_of.insert(root, groups.len() - 1);
                groups.len() - 1
            }
        };
        if root != position
            && let Some(child) = slots[position].take()
        {
            groups[group].push_child(child);
        }
    }
    let unresolved = parent_of
        .iter()
        .zip(&resolved)
        .filter(|(parent, resolved)| parent.is_some() && resolved.is_none())
        .count();
    if unresolved > 0 {
        debug!("Kept {unresolved} records as roots because their parent is itself a child");
    }
    groups
}
