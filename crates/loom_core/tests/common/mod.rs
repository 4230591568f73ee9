//! In-memory fakes of the engine's collaborators, shared by the
//! integration suites.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use loom_core::api::{
    AgentDetail, CreateAgentRequest, CreateBlockRequest, EntityApi, GroupDetail, LlmConfig,
    UpdateAgentRequest, UpdateBlockRequest, UpdateGroupRequest,
};
use loom_core::error::{ApiError, StoreError};
use loom_core::store::{DeployedAgentRecord, DeploymentOutcome, MigrationStore};
use loom_core::{
    ActorId, AgentTemplate, BlockAssociation, BlockTemplate, Deployment, DeploymentEntity,
    DeploymentId, DeploymentStatus, EngineConfig, EntityKind, LiveEntityId, ManagerType,
    MigrationEngine, ModelResolver, OrganizationId, Result, Template, TemplateEntityId,
    TemplateId, TemplateVersion,
};

pub const ORG: &str = "org-1";
pub const ACTOR: &str = "actor-1";

// ---------------------------------------------------------------------------
// Remote entity API fake

#[derive(Debug, Clone)]
pub struct FakeAgent {
    pub deployment_id: DeploymentId,
    pub entity_id: TemplateEntityId,
    pub name: String,
    pub llm_config: LlmConfig,
    pub tool_variables: HashMap<String, String>,
    pub block_ids: Vec<LiveEntityId>,
}

#[derive(Debug, Clone)]
pub struct FakeBlock {
    pub deployment_id: DeploymentId,
    pub entity_id: TemplateEntityId,
    pub label: String,
    pub value: String,
    pub limit: u32,
    pub description: Option<String>,
    pub read_only: bool,
    pub preserve_on_migration: bool,
}

#[derive(Debug, Clone)]
pub struct FakeGroup {
    pub deployment_id: DeploymentId,
    pub entity_id: TemplateEntityId,
    pub manager_type: ManagerType,
    pub agent_ids: Vec<LiveEntityId>,
}

#[derive(Debug, Default, Clone)]
pub struct ApiCounters {
    pub created_agents: usize,
    pub deleted_agents: usize,
    pub created_blocks: usize,
    pub deleted_blocks: usize,
    pub entity_listings: usize,
}

#[derive(Default)]
struct ApiInner {
    agents: HashMap<LiveEntityId, FakeAgent>,
    blocks: HashMap<LiveEntityId, FakeBlock>,
    groups: HashMap<LiveEntityId, FakeGroup>,
    group_updates: Vec<(LiveEntityId, UpdateGroupRequest)>,
    counters: ApiCounters,
    fail_agent_creation_for: HashSet<DeploymentId>,
    next_id: u64,
}

impl ApiInner {
    fn mint_id(&mut self, prefix: &str) -> LiveEntityId {
        self.next_id += 1;
        LiveEntityId::new(format!("{prefix}-{}", self.next_id))
    }
}

#[derive(Default)]
pub struct InMemoryApi {
    inner: Mutex<ApiInner>,
}

impl InMemoryApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_agent(&self, live_id: &str, agent: FakeAgent) -> LiveEntityId {
        let id = LiveEntityId::new(live_id);
        self.inner.lock().unwrap().agents.insert(id.clone(), agent);
        id
    }

    pub fn seed_block(&self, live_id: &str, block: FakeBlock) -> LiveEntityId {
        let id = LiveEntityId::new(live_id);
        self.inner.lock().unwrap().blocks.insert(id.clone(), block);
        id
    }

    pub fn seed_group(&self, live_id: &str, group: FakeGroup) -> LiveEntityId {
        let id = LiveEntityId::new(live_id);
        self.inner.lock().unwrap().groups.insert(id.clone(), group);
        id
    }

    pub fn fail_agent_creation_for(&self, deployment_id: &DeploymentId) {
        self.inner
            .lock()
            .unwrap()
            .fail_agent_creation_for
            .insert(deployment_id.clone());
    }

    pub fn counters(&self) -> ApiCounters {
        self.inner.lock().unwrap().counters.clone()
    }

    pub fn block(&self, live_id: &LiveEntityId) -> Option<FakeBlock> {
        self.inner.lock().unwrap().blocks.get(live_id).cloned()
    }

    pub fn agent(&self, live_id: &LiveEntityId) -> Option<FakeAgent> {
        self.inner.lock().unwrap().agents.get(live_id).cloned()
    }

    pub fn group_updates(&self) -> Vec<(LiveEntityId, UpdateGroupRequest)> {
        self.inner.lock().unwrap().group_updates.clone()
    }

    pub fn entity_ids(&self, deployment_id: &DeploymentId) -> HashSet<TemplateEntityId> {
        let inner = self.inner.lock().unwrap();
        let mut ids = HashSet::new();
        for a in inner.agents.values().filter(|a| &a.deployment_id == deployment_id) {
            ids.insert(a.entity_id.clone());
        }
        for b in inner.blocks.values().filter(|b| &b.deployment_id == deployment_id) {
            ids.insert(b.entity_id.clone());
        }
        for g in inner.groups.values().filter(|g| &g.deployment_id == deployment_id) {
            ids.insert(g.entity_id.clone());
        }
        ids
    }

    pub fn agent_by_entity(&self, deployment_id: &DeploymentId, entity_id: &str) -> Option<(LiveEntityId, FakeAgent)> {
        let wanted = TemplateEntityId::new(entity_id);
        let inner = self.inner.lock().unwrap();
        inner
            .agents
            .iter()
            .find(|(_, a)| &a.deployment_id == deployment_id && a.entity_id == wanted)
            .map(|(id, a)| (id.clone(), a.clone()))
    }
}

fn agent_detail(id: &LiveEntityId, agent: &FakeAgent) -> AgentDetail {
    AgentDetail {
        id: id.clone(),
        name: agent.name.clone(),
        llm_config: agent.llm_config.clone(),
        tool_exec_environment_variables: agent.tool_variables.clone(),
    }
}

#[async_trait]
impl EntityApi for InMemoryApi {
    async fn list_deployment_entities(
        &self,
        _actor: &ActorId,
        deployment_id: &DeploymentId,
    ) -> std::result::Result<Vec<DeploymentEntity>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.counters.entity_listings += 1;
        let mut out = Vec::new();
        for (id, a) in &inner.agents {
            if &a.deployment_id == deployment_id {
                out.push(DeploymentEntity {
                    kind: EntityKind::Agent,
                    live_id: id.clone(),
                    entity_id: a.entity_id.clone(),
                });
            }
        }
        for (id, b) in &inner.blocks {
            if &b.deployment_id == deployment_id {
                out.push(DeploymentEntity {
                    kind: EntityKind::Block,
                    live_id: id.clone(),
                    entity_id: b.entity_id.clone(),
                });
            }
        }
        for (id, g) in &inner.groups {
            if &g.deployment_id == deployment_id {
                out.push(DeploymentEntity {
                    kind: EntityKind::Group,
                    live_id: id.clone(),
                    entity_id: g.entity_id.clone(),
                });
            }
        }
        // Deterministic order keeps assertions simple
        out.sort_by(|a, b| a.live_id.cmp(&b.live_id));
        Ok(out)
    }

    async fn create_agent(
        &self,
        _actor: &ActorId,
        request: CreateAgentRequest,
    ) -> std::result::Result<AgentDetail, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .fail_agent_creation_for
            .contains(&request.provenance.deployment_id)
        {
            return Err(ApiError::rejected("injected agent creation failure"));
        }
        let id = inner.mint_id("agent");
        let agent = FakeAgent {
            deployment_id: request.provenance.deployment_id.clone(),
            entity_id: request.provenance.entity_id.clone(),
            name: request.name.clone(),
            llm_config: request.llm_config.clone(),
            tool_variables: request.tool_exec_environment_variables.clone(),
            block_ids: request.block_ids.clone(),
        };
        let detail = agent_detail(&id, &agent);
        inner.agents.insert(id, agent);
        inner.counters.created_agents += 1;
        Ok(detail)
    }

    async fn retrieve_agent(
        &self,
        _actor: &ActorId,
        id: &LiveEntityId,
    ) -> std::result::Result<AgentDetail, ApiError> {
        let inner = self.inner.lock().unwrap();
        let agent = inner.agents.get(id).ok_or(ApiError::NotFound {
            kind: EntityKind::Agent,
            id: id.as_str().to_string(),
        })?;
        Ok(agent_detail(id, agent))
    }

    async fn update_agent(
        &self,
        _actor: &ActorId,
        id: &LiveEntityId,
        request: UpdateAgentRequest,
    ) -> std::result::Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let agent = inner.agents.get_mut(id).ok_or(ApiError::NotFound {
            kind: EntityKind::Agent,
            id: id.as_str().to_string(),
        })?;
        if let Some(block_ids) = request.block_ids {
            agent.block_ids = block_ids;
        }
        if let Some(vars) = request.tool_exec_environment_variables {
            agent.tool_variables = vars;
        }
        if let Some(llm) = request.llm_config {
            agent.llm_config = llm;
        }
        Ok(())
    }

    async fn delete_agent(
        &self,
        _actor: &ActorId,
        id: &LiveEntityId,
    ) -> std::result::Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.agents.remove(id).ok_or(ApiError::NotFound {
            kind: EntityKind::Agent,
            id: id.as_str().to_string(),
        })?;
        inner.counters.deleted_agents += 1;
        Ok(())
    }

    async fn create_block(
        &self,
        _actor: &ActorId,
        request: CreateBlockRequest,
    ) -> std::result::Result<LiveEntityId, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.mint_id("block");
        inner.blocks.insert(
            id.clone(),
            FakeBlock {
                deployment_id: request.provenance.deployment_id.clone(),
                entity_id: request.provenance.entity_id.clone(),
                label: request.label,
                value: request.value,
                limit: request.limit,
                description: request.description,
                read_only: request.read_only,
                preserve_on_migration: request.preserve_on_migration,
            },
        );
        inner.counters.created_blocks += 1;
        Ok(id)
    }

    async fn update_agent_block(
        &self,
        _actor: &ActorId,
        agent_id: &LiveEntityId,
        block_id: &LiveEntityId,
        request: UpdateBlockRequest,
    ) -> std::result::Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.agents.contains_key(agent_id) {
            return Err(ApiError::NotFound {
                kind: EntityKind::Agent,
                id: agent_id.as_str().to_string(),
            });
        }
        let block = inner.blocks.get_mut(block_id).ok_or(ApiError::NotFound {
            kind: EntityKind::Block,
            id: block_id.as_str().to_string(),
        })?;
        if let Some(value) = request.value {
            block.value = value;
        }
        if let Some(limit) = request.limit {
            block.limit = limit;
        }
        if request.description.is_some() {
            block.description = request.description;
        }
        if let Some(read_only) = request.read_only {
            block.read_only = read_only;
        }
        if let Some(preserve) = request.preserve_on_migration {
            block.preserve_on_migration = preserve;
        }
        Ok(())
    }

    async fn delete_block(
        &self,
        _actor: &ActorId,
        id: &LiveEntityId,
    ) -> std::result::Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.blocks.remove(id).ok_or(ApiError::NotFound {
            kind: EntityKind::Block,
            id: id.as_str().to_string(),
        })?;
        inner.counters.deleted_blocks += 1;
        Ok(())
    }

    async fn agents_holding_block(
        &self,
        _actor: &ActorId,
        block_id: &LiveEntityId,
    ) -> std::result::Result<Vec<LiveEntityId>, ApiError> {
        let inner = self.inner.lock().unwrap();
        let mut holders: Vec<LiveEntityId> = inner
            .agents
            .iter()
            .filter(|(_, a)| a.block_ids.contains(block_id))
            .map(|(id, _)| id.clone())
            .collect();
        holders.sort();
        Ok(holders)
    }

    async fn retrieve_group(
        &self,
        _actor: &ActorId,
        id: &LiveEntityId,
    ) -> std::result::Result<GroupDetail, ApiError> {
        let inner = self.inner.lock().unwrap();
        let group = inner.groups.get(id).ok_or(ApiError::NotFound {
            kind: EntityKind::Group,
            id: id.as_str().to_string(),
        })?;
        Ok(GroupDetail {
            id: id.clone(),
            manager_type: group.manager_type,
            agent_ids: group.agent_ids.clone(),
        })
    }

    async fn update_group(
        &self,
        _actor: &ActorId,
        id: &LiveEntityId,
        request: UpdateGroupRequest,
    ) -> std::result::Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let group = inner.groups.get_mut(id).ok_or(ApiError::NotFound {
            kind: EntityKind::Group,
            id: id.as_str().to_string(),
        })?;
        group.agent_ids = request.agent_ids.clone();
        inner.group_updates.push((id.clone(), request));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store fake

#[derive(Default)]
struct StoreInner {
    templates: HashMap<TemplateId, Template>,
    agent_templates: HashMap<TemplateId, Vec<AgentTemplate>>,
    block_templates: HashMap<TemplateId, Vec<BlockTemplate>>,
    associations: HashMap<TemplateId, Vec<BlockAssociation>>,
    deployments: HashMap<DeploymentId, Deployment>,
    variables: HashMap<LiveEntityId, HashMap<String, String>>,
    deployed_agents: Vec<DeployedAgentRecord>,
    page_fetch_offsets: Vec<u64>,
    fail_ready_finish: bool,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_template(
        &self,
        template: Template,
        agents: Vec<AgentTemplate>,
        blocks: Vec<BlockTemplate>,
        associations: Vec<BlockAssociation>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let id = template.id.clone();
        inner.templates.insert(id.clone(), template);
        inner.agent_templates.insert(id.clone(), agents);
        inner.block_templates.insert(id.clone(), blocks);
        inner.associations.insert(id, associations);
    }

    pub fn put_deployment(&self, deployment: Deployment) {
        self.inner
            .lock()
            .unwrap()
            .deployments
            .insert(deployment.id.clone(), deployment);
    }

    pub fn set_agent_variables(&self, agent_id: &LiveEntityId, vars: HashMap<String, String>) {
        self.inner
            .lock()
            .unwrap()
            .variables
            .insert(agent_id.clone(), vars);
    }

    pub fn deployment_status(&self, id: &DeploymentId) -> Option<(DeploymentStatus, Option<String>)> {
        self.inner
            .lock()
            .unwrap()
            .deployments
            .get(id)
            .map(|d| (d.status, d.status_message.clone()))
    }

    pub fn deployed_agent_records(&self) -> Vec<DeployedAgentRecord> {
        self.inner.lock().unwrap().deployed_agents.clone()
    }

    pub fn variables_of(&self, agent_id: &LiveEntityId) -> HashMap<String, String> {
        self.inner
            .lock()
            .unwrap()
            .variables
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn page_fetch_offsets(&self) -> Vec<u64> {
        self.inner.lock().unwrap().page_fetch_offsets.clone()
    }

    /// Make every `Ready` terminal write fail with a backend error.
    pub fn fail_ready_finish(&self) {
        self.inner.lock().unwrap().fail_ready_finish = true;
    }
}

#[async_trait]
impl MigrationStore for InMemoryStore {
    async fn template(&self, id: &TemplateId) -> std::result::Result<Option<Template>, StoreError> {
        Ok(self.inner.lock().unwrap().templates.get(id).cloned())
    }

    async fn current_template_version(
        &self,
        base_template_id: &TemplateId,
        organization_id: &OrganizationId,
    ) -> std::result::Result<Option<Template>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .templates
            .values()
            .find(|t| {
                &t.base_template_id == base_template_id
                    && &t.organization_id == organization_id
                    && t.version == TemplateVersion::Current
            })
            .cloned())
    }

    async fn agent_templates(
        &self,
        template_id: &TemplateId,
    ) -> std::result::Result<Vec<AgentTemplate>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .agent_templates
            .get(template_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn block_templates(
        &self,
        template_id: &TemplateId,
    ) -> std::result::Result<Vec<BlockTemplate>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .block_templates
            .get(template_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn block_associations(
        &self,
        template_id: &TemplateId,
    ) -> std::result::Result<Vec<BlockAssociation>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .associations
            .get(template_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn deployment(
        &self,
        id: &DeploymentId,
    ) -> std::result::Result<Option<Deployment>, StoreError> {
        Ok(self.inner.lock().unwrap().deployments.get(id).cloned())
    }

    async fn claim_deployment(&self, id: &DeploymentId) -> std::result::Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let deployment = inner
            .deployments
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("deployment", id.as_str()))?;
        if deployment.status == DeploymentStatus::Migrating {
            return Ok(false);
        }
        deployment.status = DeploymentStatus::Migrating;
        Ok(true)
    }

    async fn finish_deployment(
        &self,
        id: &DeploymentId,
        outcome: DeploymentOutcome,
    ) -> std::result::Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_ready_finish && matches!(outcome, DeploymentOutcome::Ready { .. }) {
            return Err(StoreError::backend("injected status write failure"));
        }
        let deployment = inner
            .deployments
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("deployment", id.as_str()))?;
        match outcome {
            DeploymentOutcome::Ready { template_id } => {
                deployment.status = DeploymentStatus::Ready;
                deployment.status_message = None;
                deployment.template_id = template_id;
            }
            DeploymentOutcome::Failed { message } => {
                deployment.status = DeploymentStatus::Failed;
                deployment.status_message = Some(message);
            }
        }
        Ok(())
    }

    async fn count_deployments(
        &self,
        base_template_id: &TemplateId,
        organization_id: &OrganizationId,
    ) -> std::result::Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .deployments
            .values()
            .filter(|d| {
                d.base_template_id.as_ref() == Some(base_template_id)
                    && &d.organization_id == organization_id
            })
            .count() as u64)
    }

    async fn deployments_page(
        &self,
        base_template_id: &TemplateId,
        organization_id: &OrganizationId,
        offset: u64,
        limit: u64,
    ) -> std::result::Result<Vec<Deployment>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.page_fetch_offsets.push(offset);
        let mut matching: Vec<Deployment> = inner
            .deployments
            .values()
            .filter(|d| {
                d.base_template_id.as_ref() == Some(base_template_id)
                    && &d.organization_id == organization_id
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn agent_variables(
        &self,
        agent_id: &LiveEntityId,
    ) -> std::result::Result<HashMap<String, String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .variables
            .get(agent_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_agent_variables(
        &self,
        agent_id: &LiveEntityId,
        variables: &HashMap<String, String>,
    ) -> std::result::Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .variables
            .insert(agent_id.clone(), variables.clone());
        Ok(())
    }

    async fn record_deployed_agent(
        &self,
        record: &DeployedAgentRecord,
        seed_variables: &HashMap<String, String>,
    ) -> std::result::Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.deployed_agents.push(record.clone());
        inner
            .variables
            .insert(record.agent_id.clone(), seed_variables.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Model resolver fake

pub struct StaticResolver {
    pub known: Vec<LlmConfig>,
}

#[async_trait]
impl ModelResolver for StaticResolver {
    async fn resolve(&self, handle: &str) -> Result<Option<LlmConfig>> {
        Ok(self.known.iter().find(|c| c.model == handle).cloned())
    }

    async fn available(&self) -> Result<Vec<LlmConfig>> {
        Ok(self.known.clone())
    }
}

// ---------------------------------------------------------------------------
// Builders

pub fn llm_config(model: &str) -> LlmConfig {
    LlmConfig {
        model: model.to_string(),
        provider: "test".to_string(),
        context_window: 32_000,
        max_tokens: Some(4096),
        max_reasoning_tokens: None,
        temperature: Some(0.7),
        enable_reasoner: None,
        put_inner_thoughts_in_kwargs: None,
        verbosity: None,
        reasoning_effort: None,
    }
}

pub fn agent_template(entity_id: &str, model: &str) -> AgentTemplate {
    AgentTemplate {
        entity_id: TemplateEntityId::new(entity_id),
        system_prompt: "You are a helpful agent.".to_string(),
        model: model.to_string(),
        tool_ids: vec!["tool-send".to_string()],
        tool_rules: vec![],
        source_ids: vec![],
        identity_ids: vec![],
        tags: vec![],
        tool_variables: HashMap::new(),
        overrides: Default::default(),
    }
}

pub fn block_template(entity_id: &str, label: &str, value: &str) -> BlockTemplate {
    BlockTemplate {
        entity_id: TemplateEntityId::new(entity_id),
        label: label.to_string(),
        value: value.to_string(),
        limit: 5000,
        description: None,
        read_only: false,
        preserve_on_migration: false,
    }
}

pub fn template(id: &str, base: &str, version: TemplateVersion) -> Template {
    Template {
        id: TemplateId::new(id),
        base_template_id: TemplateId::new(base),
        version,
        organization_id: OrganizationId::new(ORG),
        project_id: "project-1".to_string(),
        manager_type: None,
        group_config: None,
    }
}

pub fn deployment(id: &str, template_id: &str, base: &str) -> Deployment {
    Deployment {
        id: DeploymentId::new(id),
        organization_id: OrganizationId::new(ORG),
        project_id: "project-1".to_string(),
        template_id: TemplateId::new(template_id),
        base_template_id: Some(TemplateId::new(base)),
        status: DeploymentStatus::Ready,
        status_message: None,
    }
}

pub fn engine(api: Arc<InMemoryApi>, store: Arc<InMemoryStore>, models: Vec<LlmConfig>) -> MigrationEngine {
    MigrationEngine::new(
        api,
        store,
        Arc::new(StaticResolver { known: models }),
        EngineConfig::default(),
    )
}

pub fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
