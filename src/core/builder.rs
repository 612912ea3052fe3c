//! Crew 构建器：统一的 Agent 初始化逻辑
//!
//! 未显式提供的组件按配置创建：Oracle 后端、HTTP Actuator、相机、案例库与成败判定。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::actuator::{Actuator, FileCamera, FrameSource, HttpActuator, HttpCamera};
use crate::agents::{
    run_agent, Actor, Agent, Annotator, Archivist, Gatekeeper, OutcomeJudge, Planner,
    PolicyJudge, PromptSet,
};
use crate::board::Blackboard;
use crate::config::{AppConfig, Judgement};
use crate::core::orchestrator::{create_oracle_from_config, Crew};
use crate::core::AgentError;
use crate::llm::{BoundedOracle, Oracle};
use crate::memory::{CaseMemory, FileCaseMemory, InMemoryCaseMemory};
use crate::tools::ActionExecutor;

pub struct CrewBuilder {
    config: AppConfig,
    oracle: Option<Arc<dyn Oracle>>,
    actuator: Option<Arc<dyn Actuator>>,
    camera: Option<Arc<dyn FrameSource>>,
    case_memory: Option<Arc<dyn CaseMemory>>,
    judge: Option<Arc<dyn OutcomeJudge>>,
    prompts: Option<PromptSet>,
    cancel: Option<CancellationToken>,
}

impl CrewBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            oracle: None,
            actuator: None,
            camera: None,
            case_memory: None,
            judge: None,
            prompts: None,
            cancel: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_actuator(mut self, actuator: Arc<dyn Actuator>) -> Self {
        self.actuator = Some(actuator);
        self
    }

    pub fn with_camera(mut self, camera: Arc<dyn FrameSource>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_case_memory(mut self, memory: Arc<dyn CaseMemory>) -> Self {
        self.case_memory = Some(memory);
        self
    }

    pub fn with_judge(mut self, judge: Arc<dyn OutcomeJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Agent 在该 token 取消时停止（默认新建）
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn default_camera(&self) -> Result<Option<Arc<dyn FrameSource>>, AgentError> {
        let vision = &self.config.vision;
        if let Some(url) = &vision.camera_url {
            let timeout = Duration::from_secs(self.config.actuator.timeout_secs);
            return Ok(Some(Arc::new(HttpCamera::new(url, timeout)?)));
        }
        Ok(vision
            .image_path
            .as_ref()
            .map(|path| Arc::new(FileCamera::new(path)) as Arc<dyn FrameSource>))
    }

    fn default_case_memory(&self) -> Result<Arc<dyn CaseMemory>, AgentError> {
        let memory = &self.config.memory;
        Ok(match &memory.case_store_path {
            Some(path) => Arc::new(FileCaseMemory::open(path, memory.max_entries)?),
            None => Arc::new(InMemoryCaseMemory::new(memory.max_entries)),
        })
    }

    /// 创建全部组件并在当前 tokio 运行时上启动 Agent
    pub fn start(self) -> Result<Crew, AgentError> {
        let cfg = &self.config;
        let prompts = self.prompts.clone().unwrap_or_else(PromptSet::load);
        let oracle = BoundedOracle::new(
            self.oracle
                .clone()
                .unwrap_or_else(|| create_oracle_from_config(cfg)),
            Duration::from_secs(cfg.llm.timeout_secs),
        );
        let actuator: Arc<dyn Actuator> = match &self.actuator {
            Some(actuator) => actuator.clone(),
            None => Arc::new(HttpActuator::new(
                &cfg.actuator.base_url,
                Duration::from_secs(cfg.actuator.timeout_secs),
            )?),
        };
        let camera = match &self.camera {
            Some(camera) => Some(camera.clone()),
            None => self.default_camera()?,
        };
        let case_memory = match &self.case_memory {
            Some(memory) => memory.clone(),
            None => self.default_case_memory()?,
        };
        let judge: Arc<dyn OutcomeJudge> = match (&self.judge, cfg.mission.judgement) {
            (Some(judge), _) => judge.clone(),
            (None, Judgement::Policy) => Arc::new(PolicyJudge),
            (None, Judgement::Operator) => {
                tracing::warn!("no operator channel attached, judging missions by policy");
                Arc::new(PolicyJudge)
            }
        };

        let board = Arc::new(Blackboard::new());
        let cancel = self.cancel.clone().unwrap_or_else(CancellationToken::new);

        let planner = Arc::new(
            Planner::new(oracle.clone(), prompts.planner.clone(), cfg.app.history_turns)
                .with_case_memory(case_memory.clone(), cfg.memory.top_k),
        );
        let mut annotator = Annotator::new(oracle.clone(), prompts.vision.clone());
        if let Some(camera) = camera {
            annotator = annotator.with_camera(camera);
        }
        let actor = Arc::new(
            Actor::new(oracle.clone(), prompts.navigator.clone()).with_policy(
                cfg.mission.rejection_policy,
                Duration::from_secs(cfg.mission.verdict_timeout_secs),
            ),
        );
        let executor = ActionExecutor::new(
            actuator,
            Duration::from_secs(cfg.actuator.timeout_secs),
        );

        let mut agents: Vec<Arc<dyn Agent>> = Vec::new();
        agents.push(planner.clone());
        agents.push(Arc::new(annotator));
        agents.push(actor.clone());
        for index in 1..=cfg.mission.gatekeepers.max(1) {
            agents.push(Arc::new(Gatekeeper::new(
                format!("gatekeeper-{index}"),
                oracle.clone(),
                prompts.guardian.clone(),
                executor.clone(),
            )));
        }
        agents.push(Arc::new(Archivist::new(case_memory.clone(), judge)));

        let tasks = agents
            .into_iter()
            .map(|agent| {
                let name = agent.name().to_string();
                let task = tokio::spawn(run_agent(agent, board.clone(), cancel.child_token()));
                (name, task)
            })
            .collect();
        tracing::info!(
            gatekeepers = cfg.mission.gatekeepers.max(1),
            policy = ?cfg.mission.rejection_policy,
            "crew started"
        );

        Ok(Crew {
            board,
            actor,
            planner,
            case_memory,
            cancel,
            tasks,
        })
    }
}
