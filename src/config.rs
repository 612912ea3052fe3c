//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SKYHIVE__*` 覆盖（双下划线表示嵌套，如 `SKYHIVE__ACTUATOR__BASE_URL=http://10.0.0.2:5002`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub actuator: ActuatorSection,
    pub vision: VisionSection,
    pub mission: MissionSection,
    pub memory: MemorySection,
}

/// [app] 段：应用名、Planner 结论日志长度
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// Planner 保留的步骤结论条数（反馈给下一次规划）
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            history_turns: default_history_turns(),
        }
    }
}

fn default_history_turns() -> usize {
    20
}

/// [llm] 段：Oracle 后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock；无 API Key 时回退到 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// 场景描述使用的多模态模型，未设置时沿用 model
    pub vision_model: Option<String>,
    pub base_url: Option<String>,
    /// 单次 Oracle 调用超时（秒）
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            vision_model: None,
            base_url: None,
            timeout_secs: default_oracle_timeout(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_oracle_timeout() -> u64 {
    60
}

/// [actuator] 段：无人机控制服务地址与请求超时
#[derive(Debug, Clone, Deserialize)]
pub struct ActuatorSection {
    #[serde(default = "default_actuator_url")]
    pub base_url: String,
    #[serde(default = "default_actuator_timeout")]
    pub timeout_secs: u64,
}

impl Default for ActuatorSection {
    fn default() -> Self {
        Self {
            base_url: default_actuator_url(),
            timeout_secs: default_actuator_timeout(),
        }
    }
}

fn default_actuator_url() -> String {
    "http://localhost:5002".to_string()
}

fn default_actuator_timeout() -> u64 {
    5
}

/// [vision] 段：相机帧来源（优先 camera_url，其次 image_path）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VisionSection {
    pub camera_url: Option<String>,
    pub image_path: Option<PathBuf>,
}

/// 某一步动作被拒绝后是否继续后续步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// 等待每条 proposal 的结论，首次拒绝即停止该计划
    #[default]
    Halt,
    /// 不等待结论，依次提交所有步骤
    Continue,
}

/// 任务成功与否由谁判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Judgement {
    /// 询问操作员
    #[default]
    Operator,
    /// 全部批准且执行无失败即成功
    Policy,
}

/// [mission] 段：拒绝策略、等待结论超时、成功判定方式、Gatekeeper 数量
#[derive(Debug, Clone, Deserialize)]
pub struct MissionSection {
    #[serde(default)]
    pub rejection_policy: RejectionPolicy,
    #[serde(default = "default_verdict_timeout")]
    pub verdict_timeout_secs: u64,
    #[serde(default)]
    pub judgement: Judgement,
    #[serde(default = "default_gatekeepers")]
    pub gatekeepers: usize,
}

impl Default for MissionSection {
    fn default() -> Self {
        Self {
            rejection_policy: RejectionPolicy::default(),
            verdict_timeout_secs: default_verdict_timeout(),
            judgement: Judgement::default(),
            gatekeepers: default_gatekeepers(),
        }
    }
}

fn default_verdict_timeout() -> u64 {
    120
}

fn default_gatekeepers() -> usize {
    1
}

/// [memory] 段：任务案例库
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    /// JSONL 文件路径；未设置时仅保存在内存中
    pub case_store_path: Option<PathBuf>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// 规划时检索的历史案例数
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            case_store_path: None,
            max_entries: default_max_entries(),
            top_k: default_top_k(),
        }
    }
}

fn default_max_entries() -> usize {
    1000
}

fn default_top_k() -> usize {
    3
}

/// 从 config 目录加载配置，环境变量 SKYHIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SKYHIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SKYHIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
