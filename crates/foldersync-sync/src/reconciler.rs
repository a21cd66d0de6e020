//! Reconciler
//!
//! Compares a source inventory against a replica inventory and returns the
//! operations that make the replica match the source. Pure: no I/O, no
//! clock, no logging. Content hashes, when the policy needs them, must
//! already be attached to the inventories.
//!
//! ## Ordering
//!
//! Deletions come first, in reverse lexicographic key order, so every path
//! is removed before its parent directory. Creations and updates follow in
//! lexicographic key order, so every directory exists before anything is
//! written into it. Both follow from the fact that an ancestor's key is a
//! strict prefix of its descendants' keys.

use foldersync_core::domain::{
    permissions_differ, ComparisonPolicy, EntryKind, Inventory, Operation,
};

/// Computes the ordered operations that mirror `source` onto `replica`
///
/// - Create and Update carry the source spelling of the path.
/// - Delete carries the replica spelling of the path.
/// - A kind change yields a Delete of the old kind followed by a Create of
///   the new one. A replica link is always such a kind change.
/// - A directory pair is updated only when its permission bits differ.
/// - Replica-only paths below a source directory that could not be listed
///   are kept.
pub fn reconcile(
    source: &Inventory,
    replica: &Inventory,
    policy: &dyn ComparisonPolicy,
) -> Vec<Operation> {
    let mut deletes: Vec<(&str, Operation)> = Vec::new();
    let mut upserts: Vec<(&str, Operation)> = Vec::new();

    for (key, src) in source.iter() {
        match replica.get_by_key(key) {
            None => {
                upserts.push((key, Operation::Create(src.relative_path().clone(), src.kind())));
            }
            Some(rep) if rep.kind() != src.kind() => {
                deletes.push((key, Operation::Delete(rep.relative_path().clone(), rep.kind())));
                upserts.push((key, Operation::Create(src.relative_path().clone(), src.kind())));
            }
            Some(rep) => {
                let modified = match src.kind() {
                    EntryKind::File => policy.is_modified(src, rep),
                    EntryKind::Directory => permissions_differ(src, rep),
                    EntryKind::Symlink => false,
                };
                if modified {
                    upserts.push((key, Operation::Update(src.relative_path().clone(), src.kind())));
                }
            }
        }
    }

    for (key, rep) in replica.iter() {
        if source.get_by_key(key).is_some() {
            continue;
        }
        if source.is_under_incomplete(rep.relative_path()) {
            continue;
        }
        deletes.push((key, Operation::Delete(rep.relative_path().clone(), rep.kind())));
    }

    deletes.sort_by(|a, b| b.0.cmp(a.0));
    upserts.sort_by(|a, b| a.0.cmp(b.0));

    deletes
        .into_iter()
        .chain(upserts)
        .map(|(_, op)| op)
        .collect()
}
