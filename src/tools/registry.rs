//! 动作目录
//!
//! Actor 交给 Oracle 的固定动作集合：名称、描述（供 Oracle 理解）、参数 schema。
//! 目录只描述动作，解析与校验在 `tools::args`，执行在 `tools::executor`。

use serde_json::Value;

use crate::tools::schema::{args_schema, AscendArgs, MoveArgs, NoArgs};

/// 单个动作的描述
#[derive(Clone, Debug)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// 允许的动作集合（按注册顺序）
#[derive(Clone, Debug, Default)]
pub struct ActionCatalog {
    specs: Vec<ActionSpec>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 无人机动作集合：ascend / move / land
    pub fn drone() -> Self {
        let mut catalog = Self::new();
        catalog.register(ActionSpec {
            name: "ascend",
            description: "Take off and climb to the given altitude in meters. Args: {\"altitude\": 2.0}",
            parameters: args_schema::<AscendArgs>(),
        });
        catalog.register(ActionSpec {
            name: "move",
            description: "Move relative to the current position in meters (NED frame). Args: {\"north\": 5, \"east\": 0, \"down\": 0}",
            parameters: args_schema::<MoveArgs>(),
        });
        catalog.register(ActionSpec {
            name: "land",
            description: "Descend and land at the current position. Args: {}",
            parameters: args_schema::<NoArgs>(),
        });
        catalog
    }

    /// 同名动作覆盖旧描述
    pub fn register(&mut self, spec: ActionSpec) {
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|s| s.name).collect()
    }

    /// 生成 prompt 中的 Available actions 段落
    pub fn describe(&self) -> String {
        self.specs
            .iter()
            .map(|s| format!("- {}: {}", s.name, s.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 动作 schema JSON（包含参数 schema）
    pub fn to_schema_json(&self) -> String {
        let actions: Vec<Value> = self
            .specs
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name,
                    "description": s.description,
                    "parameters": s.parameters,
                })
            })
            .collect();
        serde_json::to_string_pretty(&actions).unwrap_or_else(|_| "[]".to_string())
    }
}
