//! Relation hook ordering.
//!
//! [`next_relation_hook`] compares the unit's durable view of one relation
//! with the controller's view and names the single hook that moves the
//! former toward the latter. Callers commit that hook and ask again until
//! nothing is left.
//!
//! Precedence, first match wins:
//!
//! 1. a pending `relation-changed` is replayed as-is;
//! 2. locally known units missing remotely depart;
//! 3. a broken relation breaks;
//! 4. remote units not known locally join;
//! 5. units whose settings version differs change.
//!
//! Within each step units are visited in sorted name order, so the hook
//! sequence never depends on map iteration order.

use itertools::Itertools;
use uniter_core::HookInfo;

use crate::remote::RelationSnapshot;
use crate::state::State;

/// Next hook to run for a relation, or `None` if `local` already reflects
/// `remote`.
///
/// `remote_broken` is set by the caller when the relation or the local
/// application is dying; the caller passes an empty `remote` in that case
/// so every member departs before the relation breaks.
pub fn next_relation_hook(
    local: &State,
    remote: &RelationSnapshot,
    remote_broken: bool,
) -> Option<HookInfo> {
    let relation_id = local.relation_id;

    if local.has_changed_pending() {
        let unit = &local.changed_pending;
        let version = remote.members.get(unit).copied().unwrap_or_default();
        return Some(HookInfo::changed(relation_id, unit.clone(), version));
    }

    let all_units: Vec<&String> = local
        .members
        .keys()
        .chain(remote.members.keys())
        .sorted()
        .dedup()
        .collect();

    let departed = all_units.iter().find_map(|unit| {
        let version = local.members.get(*unit)?;
        (!remote.members.contains_key(*unit))
            .then(|| HookInfo::departed(relation_id, (*unit).clone(), *version))
    });
    if departed.is_some() {
        return departed;
    }

    if remote_broken {
        return Some(HookInfo::broken(relation_id));
    }

    let joined = all_units.iter().find_map(|unit| {
        let version = remote.members.get(*unit)?;
        (!local.members.contains_key(*unit))
            .then(|| HookInfo::joined(relation_id, (*unit).clone(), *version))
    });
    if joined.is_some() {
        return joined;
    }

    // Versions are compared for equality only: they reset when the
    // relation's settings are recreated.
    all_units.iter().find_map(|unit| {
        let remote_version = remote.members.get(*unit)?;
        let local_version = local.members.get(*unit)?;
        (remote_version != local_version)
            .then(|| HookInfo::changed(relation_id, (*unit).clone(), *remote_version))
    })
}
