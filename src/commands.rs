//! CLI command handlers.
//!
//! Both commands are read-only: `state` prints the durable records and
//! `plan` replays the hook ordering in memory.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};
use uniter_core::{ChangeVersion, HookInfo, HookKind, RelationId};
use uniter_relation::{
    RelationSnapshot, RelationsConfig, Snapshot, State, next_relation_hook, read_all_state_dirs,
};

use crate::cli::{Commands, StateSource};

/// Execute a CLI command.
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::State { source, json } => cmd_state(&source, json),
        Commands::Plan {
            source,
            snapshot,
            relation,
            json,
        } => cmd_plan(&source, &snapshot, relation.map(RelationId::new), json).await,
    }
}

/// Relations directory and the changed-after-join setting for `source`.
fn resolve_source(source: &StateSource) -> Result<(PathBuf, bool)> {
    match (&source.relations_dir, &source.config) {
        (Some(dir), None) => Ok((dir.clone(), false)),
        (None, Some(path)) => {
            let config = RelationsConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            Ok((config.relations_dir, config.changed_after_join))
        }
        _ => bail!("exactly one of --relations-dir or --config is required"),
    }
}

fn load_states(relations_dir: &Path) -> Result<BTreeMap<RelationId, State>> {
    let dirs = read_all_state_dirs(relations_dir).with_context(|| {
        format!(
            "Failed to read relation state from {}",
            relations_dir.display()
        )
    })?;
    Ok(dirs
        .into_iter()
        .map(|(id, dir)| (id, dir.state().clone()))
        .collect())
}

#[derive(Debug, Serialize)]
struct MemberRecord {
    unit: String,
    change_version: ChangeVersion,
    changed_pending: bool,
}

#[derive(Debug, Serialize)]
struct RelationRecord {
    relation_id: RelationId,
    members: Vec<MemberRecord>,
}

fn relation_record(state: &State) -> RelationRecord {
    let members = state
        .member_names()
        .into_iter()
        .map(|unit| MemberRecord {
            change_version: state.members.get(&unit).copied().unwrap_or_default(),
            changed_pending: state.changed_pending == unit,
            unit,
        })
        .collect();
    RelationRecord {
        relation_id: state.relation_id,
        members,
    }
}

fn cmd_state(source: &StateSource, json: bool) -> Result<()> {
    let (relations_dir, _) = resolve_source(source)?;
    let records: Vec<RelationRecord> = load_states(&relations_dir)?
        .values()
        .map(relation_record)
        .collect();
    info!(count = records.len(), dir = %relations_dir.display(), "loaded relation records");

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No relation state in {}", relations_dir.display());
        return Ok(());
    }
    for record in &records {
        println!("relation {}", record.relation_id);
        if record.members.is_empty() {
            println!("  (no members)");
        }
        for member in &record.members {
            let pending = if member.changed_pending {
                "  [relation-changed pending]"
            } else {
                ""
            };
            println!(
                "  {:<24} version {}{}",
                member.unit, member.change_version, pending
            );
        }
    }
    Ok(())
}

async fn cmd_plan(
    source: &StateSource,
    snapshot_path: &Path,
    only: Option<RelationId>,
    json: bool,
) -> Result<()> {
    let (relations_dir, changed_after_join) = resolve_source(source)?;
    let states = load_states(&relations_dir)?;
    let content = tokio::fs::read_to_string(snapshot_path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", snapshot_path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Invalid snapshot {}", snapshot_path.display()))?;

    let hooks = plan_hooks(states, &snapshot, only, changed_after_join)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hooks)?);
    } else if hooks.is_empty() {
        println!("Nothing to do");
    } else {
        hooks.iter().for_each(|hook| println!("{hook}"));
    }
    Ok(())
}

/// Every hook, in order, that takes the local records to `snapshot`.
///
/// Each hook's commit is applied to an in-memory copy of the records, so
/// the result is what a unit agent would run if nothing changed remotely
/// meanwhile. Only relations present in the snapshot are visited; those
/// unknown locally are planned only when alive.
pub fn plan_hooks(
    mut states: BTreeMap<RelationId, State>,
    snapshot: &Snapshot,
    only: Option<RelationId>,
    changed_after_join: bool,
) -> Result<Vec<HookInfo>> {
    let empty = RelationSnapshot::default();
    let mut hooks = Vec::new();
    for (id, remote) in snapshot
        .relations
        .iter()
        .filter(|(id, _)| only.is_none_or(|only| only == **id))
        .sorted_by_key(|(id, _)| **id)
    {
        let id = *id;
        let known = states.remove(&id);
        if known.is_none() && !remote.life.is_alive() {
            debug!(relation_id = %id, "skipping relation that is not alive");
            continue;
        }
        let mut local = known.unwrap_or_else(|| State::new(id));

        let broken = snapshot.life.is_dying() || remote.life.is_dying();
        let remote = if broken { &empty } else { remote };

        let limit = local
            .members
            .len()
            .saturating_add(remote.members.len())
            .saturating_mul(2)
            .saturating_add(2);
        let mut planned = 0usize;
        while let Some(hook) = next_relation_hook(&local, remote, broken) {
            if planned >= limit {
                bail!("relation {id} does not converge after {planned} hooks");
            }
            local.validate(&hook)?;
            planned = planned.saturating_add(1);
            hooks.push(hook.clone());
            if hook.kind == HookKind::RelationBroken {
                break;
            }
            local.apply(&hook);
            if changed_after_join && hook.kind == HookKind::RelationJoined {
                local.changed_pending = hook.remote_unit;
            }
        }
        debug!(relation_id = %id, planned, "planned relation hooks");
    }
    Ok(hooks)
}
