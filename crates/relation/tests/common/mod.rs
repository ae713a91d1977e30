//! In-memory fakes of the capabilities the relation engine consumes.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use uniter_core::{ApiError, Life, RelationId};
use uniter_relation::{
    AbortSignal, ApiResult, CharmEndpoints, Endpoint, Relation, RelationApi, RelationUnit,
    Relations, RelationsBuilder, RelationsConfig, Result, Role, Unit, UnitWatcher,
};

pub const UNIT_NAME: &str = "wordpress/0";

/// Relation unit whose `enter_scope` replies are scripted.
pub struct FakeRelationUnit {
    id: RelationId,
    endpoint: Endpoint,
    enter_replies: Mutex<VecDeque<ApiResult<()>>>,
    leave_reply: Mutex<Option<ApiError>>,
    enter_calls: AtomicUsize,
    leave_calls: AtomicUsize,
}

impl FakeRelationUnit {
    pub fn new(id: RelationId, endpoint: Endpoint) -> Self {
        Self {
            id,
            endpoint,
            enter_replies: Mutex::new(VecDeque::new()),
            leave_reply: Mutex::new(None),
            enter_calls: AtomicUsize::new(0),
            leave_calls: AtomicUsize::new(0),
        }
    }

    /// Queue replies for successive `enter_scope` calls. Once the queue is
    /// empty every call succeeds.
    pub fn script_enter(&self, replies: Vec<ApiResult<()>>) {
        if let Ok(mut queue) = self.enter_replies.lock() {
            queue.extend(replies);
        }
    }

    pub fn fail_leave(&self, err: ApiError) {
        if let Ok(mut reply) = self.leave_reply.lock() {
            *reply = Some(err);
        }
    }

    pub fn enter_calls(&self) -> usize {
        self.enter_calls.load(Ordering::SeqCst)
    }

    pub fn leave_calls(&self) -> usize {
        self.leave_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationUnit for FakeRelationUnit {
    fn relation_id(&self) -> RelationId {
        self.id
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn enter_scope(&self) -> ApiResult<()> {
        self.enter_calls.fetch_add(1, Ordering::SeqCst);
        self.enter_replies
            .lock()
            .map_err(|_| ApiError::other("enter replies poisoned"))?
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn leave_scope(&self) -> ApiResult<()> {
        self.leave_calls.fetch_add(1, Ordering::SeqCst);
        match self
            .leave_reply
            .lock()
            .map_err(|_| ApiError::other("leave reply poisoned"))?
            .take()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct FakeRelation {
    id: RelationId,
    key: String,
    endpoint: Endpoint,
    relation_unit: Arc<FakeRelationUnit>,
}

impl FakeRelation {
    pub fn new(id: u64, endpoint: Endpoint) -> Arc<Self> {
        let id = RelationId::new(id);
        let key = format!("{}:{} remote:{}", endpoint.application_name, endpoint.name, endpoint.interface);
        Arc::new(Self {
            id,
            key,
            relation_unit: Arc::new(FakeRelationUnit::new(id, endpoint.clone())),
            endpoint,
        })
    }

    pub fn relation_unit(&self) -> &Arc<FakeRelationUnit> {
        &self.relation_unit
    }
}

#[async_trait]
impl Relation for FakeRelation {
    fn id(&self) -> RelationId {
        self.id
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn life(&self) -> ApiResult<Life> {
        Ok(Life::Alive)
    }

    async fn endpoint(&self) -> ApiResult<Endpoint> {
        Ok(self.endpoint.clone())
    }

    async fn unit(&self, unit_name: &str) -> ApiResult<Arc<dyn RelationUnit>> {
        if unit_name != UNIT_NAME {
            return Err(ApiError::unauthorized(format!("unit {unit_name:?}")));
        }
        Ok(self.relation_unit.clone())
    }
}

#[derive(Default)]
pub struct FakeApi {
    relations: Mutex<HashMap<RelationId, Arc<FakeRelation>>>,
    errors: Mutex<HashMap<RelationId, ApiError>>,
    lookups: AtomicUsize,
}

impl FakeApi {
    pub fn add(&self, relation: Arc<FakeRelation>) {
        if let Ok(mut relations) = self.relations.lock() {
            relations.insert(relation.id, relation);
        }
    }

    pub fn fail_lookup(&self, id: u64, err: ApiError) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.insert(RelationId::new(id), err);
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationApi for FakeApi {
    async fn relation_by_id(&self, id: RelationId) -> ApiResult<Arc<dyn Relation>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self
            .errors
            .lock()
            .map_err(|_| ApiError::other("errors poisoned"))?
            .get(&id)
        {
            return Err(err.clone());
        }
        self.relations
            .lock()
            .map_err(|_| ApiError::other("relations poisoned"))?
            .get(&id)
            .map(|relation| relation.clone() as Arc<dyn Relation>)
            .ok_or_else(|| ApiError::not_found(format!("relation {id}")))
    }
}

/// Watcher that reports a change every time it is asked.
pub struct TickingWatcher;

#[async_trait]
impl UnitWatcher for TickingWatcher {
    async fn next_change(&mut self) -> Option<()> {
        tokio::task::yield_now().await;
        Some(())
    }

    async fn stop(&mut self) -> ApiResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeUnit {
    joined: Mutex<Vec<RelationId>>,
    watches: AtomicUsize,
}

impl FakeUnit {
    pub fn join(&self, id: u64) {
        if let Ok(mut joined) = self.joined.lock() {
            joined.push(RelationId::new(id));
        }
    }

    pub fn watches(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Unit for FakeUnit {
    fn name(&self) -> &str {
        UNIT_NAME
    }

    async fn joined_relations(&self) -> ApiResult<Vec<RelationId>> {
        Ok(self
            .joined
            .lock()
            .map_err(|_| ApiError::other("joined poisoned"))?
            .clone())
    }

    async fn watch(&self) -> ApiResult<Box<dyn UnitWatcher>> {
        self.watches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TickingWatcher))
    }
}

/// Charm implementing every endpoint except the listed ones.
#[derive(Default)]
pub struct FakeCharm {
    missing: Mutex<HashSet<String>>,
}

impl FakeCharm {
    pub fn without(&self, endpoint: &str) {
        if let Ok(mut missing) = self.missing.lock() {
            missing.insert(endpoint.to_string());
        }
    }
}

impl CharmEndpoints for FakeCharm {
    fn implemented_by(&self, endpoint: &Endpoint, _charm_dir: &Path) -> ApiResult<bool> {
        Ok(!self
            .missing
            .lock()
            .map_err(|_| ApiError::other("missing poisoned"))?
            .contains(&endpoint.name))
    }
}

pub fn db_endpoint() -> Endpoint {
    Endpoint::new("wordpress", "db", "mysql", Role::Requirer)
}

pub fn juju_info_endpoint() -> Endpoint {
    Endpoint::new("wordpress", "juju-info", "juju-info", Role::Provider)
}

/// Everything a test needs to build a [`Relations`].
pub struct Fixture {
    pub api: Arc<FakeApi>,
    pub unit: Arc<FakeUnit>,
    pub charm: Arc<FakeCharm>,
    pub config: RelationsConfig,
    _tmp: TempDir,
}

impl Fixture {
    pub fn new() -> std::io::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let tmp = TempDir::new()?;
        let config = RelationsConfig::new(tmp.path().join("relations"), tmp.path().join("charm"));
        Ok(Self {
            api: Arc::new(FakeApi::default()),
            unit: Arc::new(FakeUnit::default()),
            charm: Arc::new(FakeCharm::default()),
            config,
            _tmp: tmp,
        })
    }

    pub fn relations_dir(&self) -> &Path {
        &self.config.relations_dir
    }

    pub fn relation_dir(&self, id: u64) -> PathBuf {
        self.config.relations_dir.join(id.to_string())
    }

    /// Write a member file as a previous agent run would have left it.
    pub fn seed_member(&self, id: u64, file_name: &str, content: &str) -> std::io::Result<()> {
        let dir = self.relation_dir(id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(file_name), content)
    }

    /// Register an alive `db` relation the controller knows about.
    pub fn add_relation(&self, id: u64) -> Arc<FakeRelation> {
        self.add_relation_with(id, db_endpoint())
    }

    pub fn add_relation_with(&self, id: u64, endpoint: Endpoint) -> Arc<FakeRelation> {
        let relation = FakeRelation::new(id, endpoint);
        self.api.add(relation.clone());
        relation
    }

    pub fn builder(&self) -> RelationsBuilder {
        RelationsBuilder::new()
            .with_api(self.api.clone())
            .with_unit(self.unit.clone())
            .with_charm(self.charm.clone())
            .with_config(self.config.clone())
    }

    pub async fn build(&self) -> Result<Relations> {
        self.builder().build().await
    }

    pub async fn build_with_abort(&self, abort: AbortSignal) -> Result<Relations> {
        self.builder().with_abort(abort).build().await
    }
}
