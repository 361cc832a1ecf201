//! Index derivation and diffing.
//!
//! Indexes are never declared directly. They are folded out of the `unique`
//! and `index` annotations of a collection's columns and matched against the
//! live indexes by physical name.

use crate::dialect::Dialect;
use crate::schema::{CollectionDescriptor, IndexDescriptor, IndexMembership, LiveIndexes};

/// An index operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexChange {
    /// Create the index.
    Add(IndexDescriptor),
    /// Drop the index with this physical name.
    Drop {
        /// Physical index name.
        name: String,
    },
}

/// Derives the desired indexes of a collection.
///
/// Anonymous memberships yield one single-column index named
/// `<column>_unique` or `<column>_index`. Named memberships are merged into
/// one index per name, with member columns in declaration order. Every name
/// passes through [`Dialect::index_name`].
#[must_use]
pub fn desired_indexes(collection: &CollectionDescriptor, dialect: &dyn Dialect) -> Vec<IndexDescriptor> {
    let mut indexes: Vec<IndexDescriptor> = Vec::new();

    for (column, descriptor) in collection.columns.iter() {
        let groups = [
            (&descriptor.unique, true, "unique"),
            (&descriptor.index, false, "index"),
        ];
        for (memberships, unique, suffix) in groups {
            for membership in memberships {
                let logical = match membership {
                    IndexMembership::Anonymous => format!("{column}_{suffix}"),
                    IndexMembership::Named(name) => name.clone(),
                };
                let name = dialect.index_name(&collection.name, &logical);

                match indexes.iter_mut().find(|index| index.name == name) {
                    Some(index) => {
                        if !index.columns.iter().any(|existing| existing == column) {
                            index.columns.push(column.to_string());
                        }
                    }
                    None => indexes.push(IndexDescriptor {
                        name,
                        collection: collection.name.clone(),
                        columns: vec![column.to_string()],
                        unique,
                    }),
                }
            }
        }
    }

    indexes
}

/// Computes the index operations that converge `live` onto `desired`.
///
/// An index whose uniqueness or member columns differ is dropped and created
/// again. Live indexes that are not desired are dropped last.
#[must_use]
pub fn diff_indexes(desired: &[IndexDescriptor], mut live: LiveIndexes) -> Vec<IndexChange> {
    let mut changes = Vec::new();

    for index in desired {
        match live.remove(&index.name) {
            None => changes.push(IndexChange::Add(index.clone())),
            Some(current) if current.unique != index.unique || current.columns != index.columns => {
                changes.push(IndexChange::Drop {
                    name: index.name.clone(),
                });
                changes.push(IndexChange::Add(index.clone()));
            }
            Some(_) => {}
        }
    }

    changes.extend(live.into_keys().map(|name| IndexChange::Drop { name }));
    changes
}
