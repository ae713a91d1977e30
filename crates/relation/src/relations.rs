//! The set of relations the unit participates in.
//!
//! [`Relations`] owns one [`Relationer`] per joined relation. It rebuilds
//! that set from durable state when created, keeps it in step with the
//! remote snapshot, and picks the next relation hook to run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use itertools::Itertools;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use uniter_core::{HookInfo, HookKind, RelationId};

use crate::abort::AbortSignal;
use crate::api::{CharmEndpoints, Relation, RelationApi, Unit};
use crate::config::RelationsConfig;
use crate::error::{Error, Result};
use crate::next_hook::next_relation_hook;
use crate::relationer::{RelationInfo, Relationer};
use crate::remote::{RelationSnapshot, Snapshot};
use crate::resolver::{LocalState, OperationKind};
use crate::scope::JoinOutcome;
use crate::statedir::{StateDir, read_all_state_dirs};

/// Relation state and operations for one unit.
pub struct Relations {
    api: Arc<dyn RelationApi>,
    unit: Arc<dyn Unit>,
    charm: Arc<dyn CharmEndpoints>,
    config: RelationsConfig,
    relationers: BTreeMap<RelationId, Relationer>,
    abort: AbortSignal,
    span: Span,
}

impl Relations {
    /// Ids of the relations with a live relationer, ascending.
    pub fn relation_ids(&self) -> Vec<RelationId> {
        self.relationers.keys().copied().collect()
    }

    pub const fn config(&self) -> &RelationsConfig {
        &self.config
    }

    /// Endpoint name of a known relation.
    pub fn name(&self, id: RelationId) -> Result<&str> {
        self.relationers
            .get(&id)
            .map(Relationer::endpoint_name)
            .ok_or(Error::unknown_relation(id))
    }

    /// Charm hook name for `info`. Nothing is changed.
    pub fn prepare_hook(&self, info: &HookInfo) -> Result<String> {
        self.relationer(info)?.prepare_hook(info)
    }

    /// Persist the effect of a hook that ran. A committed
    /// `relation-broken` removes the relation from the set.
    pub async fn commit_hook(&mut self, info: &HookInfo) -> Result<()> {
        if !info.kind.is_relation() {
            return Err(Error::NotRelationHook { kind: info.kind });
        }
        let relationer = self
            .relationers
            .get_mut(&info.relation_id)
            .ok_or(Error::unknown_relation(info.relation_id))?;
        relationer
            .commit_hook(info)
            .instrument(self.span.clone())
            .await?;
        if info.kind == HookKind::RelationBroken {
            self.relationers.remove(&info.relation_id);
            info!(parent: &self.span, relation_id = %info.relation_id, "relation broken and removed");
        }
        Ok(())
    }

    /// Current membership of every known relation.
    pub fn get_info(&self) -> BTreeMap<RelationId, RelationInfo> {
        self.relationers
            .iter()
            .map(|(id, relationer)| (*id, relationer.context_info()))
            .collect()
    }

    /// Bring the set in line with `remote`, then, if the unit is ready for
    /// new work, return the first pending hook across its relations.
    pub async fn next_hook(
        &mut self,
        local: &LocalState,
        remote: &Snapshot,
    ) -> Result<Option<HookInfo>> {
        let span = self.span.clone();
        self.update_and_pick(local, remote).instrument(span).await
    }

    async fn update_and_pick(
        &mut self,
        local: &LocalState,
        remote: &Snapshot,
    ) -> Result<Option<HookInfo>> {
        self.update(&remote.relations).await?;
        if local.kind != OperationKind::Continue {
            debug!(kind = ?local.kind, "not ready for relation hooks");
            return Ok(None);
        }
        Ok(self.pending_hook(remote))
    }

    fn pending_hook(&self, remote: &Snapshot) -> Option<HookInfo> {
        let empty = RelationSnapshot::default();
        for (id, snapshot) in remote.relations.iter().sorted_by_key(|(id, _)| **id) {
            let Some(relationer) = self.relationers.get(id) else {
                continue;
            };
            if relationer.is_implicit() {
                continue;
            }
            // Once the relation or the application is dying, members only
            // depart and the relation breaks.
            let broken =
                remote.life.is_dying() || snapshot.life.is_dying() || relationer.is_dying();
            let snapshot = if broken { &empty } else { snapshot };
            if let Some(hook) =
                next_relation_hook(relationer.state_dir().state(), snapshot, broken)
            {
                debug!(relation_id = %id, hook = %hook, "next relation hook");
                return Some(hook);
            }
        }
        None
    }

    /// Add relationers for newly alive relations and mark dying ones.
    /// Membership differences are left to [`next_relation_hook`].
    pub async fn update(&mut self, remote: &HashMap<RelationId, RelationSnapshot>) -> Result<()> {
        for (id, snapshot) in remote.iter().sorted_by_key(|(id, _)| **id) {
            let id = *id;
            if self.relationers.contains_key(&id) {
                if snapshot.life.is_dying() {
                    self.set_dying(id).await?;
                }
                continue;
            }
            // Never known, so nothing to tear down.
            if !snapshot.life.is_alive() {
                continue;
            }

            let relation = match self.api.relation_by_id(id).await {
                Ok(relation) => relation,
                Err(e) if e.is_not_found_or_unauthorized() => {
                    debug!(relation_id = %id, reason = %e, "relation not visible; skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let endpoint = relation.endpoint().await?;
            if !self.charm.implemented_by(&endpoint, &self.config.charm_dir)? {
                warn!(relation_id = %id, endpoint = %endpoint.name, "skipping relation with unknown endpoint");
                continue;
            }

            let dir = StateDir::read(&self.config.relations_dir, id)?;
            let mut created = dir.clone();
            if let Err(add_err) = self.add(relation.as_ref(), dir).await {
                if let Err(remove_err) = created.remove() {
                    error!(relation_id = %id, error = %remove_err, "cannot clean up relation state after failed join");
                }
                return Err(add_err);
            }
        }
        Ok(())
    }

    /// Join `relation`, keeping its durable state in `dir`. Blocks until the
    /// scope join finishes; an abort surfaces as [`Error::LoopAborted`].
    async fn add(&mut self, relation: &dyn Relation, dir: StateDir) -> Result<()> {
        let id = relation.id();
        info!(relation = relation.key(), path = %dir.path().display(), "joining relation");

        let relation_unit = relation.unit(self.unit.name()).await?;
        let relationer = Relationer::new(relation_unit, dir)
            .with_changed_after_join(self.config.changed_after_join);
        let watcher = self.unit.watch().await?;
        let join = relationer
            .scope_join(watcher, self.abort.clone())
            .await?;

        let outcome = tokio::spawn(join.run().instrument(self.span.clone()))
            .await
            .map_err(|e| Error::JoinTaskFailed {
                relation_id: id,
                reason: e.to_string(),
            })??;

        match outcome {
            JoinOutcome::Aborted => Err(Error::LoopAborted),
            JoinOutcome::Joined => {
                relationer.joined()?;
                self.relationers.insert(id, relationer);
                info!(relation = relation.key(), "joined relation");
                Ok(())
            }
        }
    }

    /// Tell the relationer for `id` that only teardown hooks may run.
    /// Implicit relationers are dropped at once.
    async fn set_dying(&mut self, id: RelationId) -> Result<()> {
        let Some(relationer) = self.relationers.get_mut(&id) else {
            return Ok(());
        };
        relationer.set_dying().await?;
        if relationer.is_implicit() {
            self.relationers.remove(&id);
            info!(relation_id = %id, "dropped implicit relation");
        }
        Ok(())
    }

    /// Reconcile durable state directories with the relations the unit is
    /// currently joined to.
    async fn init(&mut self) -> Result<()> {
        let mut joined = BTreeMap::new();
        for id in self.unit.joined_relations().await? {
            let relation = self.api.relation_by_id(id).await?;
            joined.insert(id, relation);
        }
        debug!(joined = ?joined.keys().collect::<Vec<_>>(), "loaded joined relations");

        let known_dirs = read_all_state_dirs(&self.config.relations_dir)?;
        let known: BTreeSet<RelationId> = known_dirs.keys().copied().collect();
        debug!(known = ?known, "loaded relation state directories");

        for (id, mut dir) in known_dirs {
            match joined.get(&id) {
                Some(relation) => self.add(relation.as_ref(), dir).await?,
                None => {
                    dir.remove()?;
                    info!(relation_id = %id, "removed state of relation no longer joined");
                }
            }
        }
        for (id, relation) in &joined {
            if known.contains(id) {
                continue;
            }
            let dir = StateDir::read(&self.config.relations_dir, *id)?;
            self.add(relation.as_ref(), dir).await?;
        }
        Ok(())
    }

    fn relationer(&self, info: &HookInfo) -> Result<&Relationer> {
        if !info.kind.is_relation() {
            return Err(Error::NotRelationHook { kind: info.kind });
        }
        self.relationers
            .get(&info.relation_id)
            .ok_or(Error::unknown_relation(info.relation_id))
    }
}

/// Builder for [`Relations`].
#[derive(Default)]
pub struct RelationsBuilder {
    api: Option<Arc<dyn RelationApi>>,
    unit: Option<Arc<dyn Unit>>,
    charm: Option<Arc<dyn CharmEndpoints>>,
    config: Option<RelationsConfig>,
    abort: Option<AbortSignal>,
    span: Option<Span>,
}

impl RelationsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the controller relation lookup.
    #[must_use]
    pub fn with_api(mut self, api: Arc<dyn RelationApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the local unit.
    #[must_use]
    pub fn with_unit(mut self, unit: Arc<dyn Unit>) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set the charm endpoint predicate.
    #[must_use]
    pub fn with_charm(mut self, charm: Arc<dyn CharmEndpoints>) -> Self {
        self.charm = Some(charm);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RelationsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the abort signal checked by scope joins. Defaults to one that
    /// never fires.
    #[must_use]
    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Set the span all engine diagnostics are recorded under. Defaults to
    /// a `relations` span carrying the unit name.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the set, reconciling durable state with the unit's joined
    /// relations. Blocks until every joined relation's scope is entered.
    pub async fn build(self) -> Result<Relations> {
        let api = self
            .api
            .ok_or_else(|| Error::invalid_config("relation api is required"))?;
        let unit = self
            .unit
            .ok_or_else(|| Error::invalid_config("unit is required"))?;
        let charm = self
            .charm
            .ok_or_else(|| Error::invalid_config("charm endpoints are required"))?;
        let config = self
            .config
            .ok_or_else(|| Error::invalid_config("configuration is required"))?;
        config.validate()?;
        let span = self
            .span
            .unwrap_or_else(|| info_span!("relations", unit = unit.name()));

        let mut relations = Relations {
            api,
            unit,
            charm,
            config,
            relationers: BTreeMap::new(),
            abort: self.abort.unwrap_or_else(AbortSignal::never),
            span: span.clone(),
        };
        relations.init().instrument(span).await?;
        Ok(relations)
    }
}
