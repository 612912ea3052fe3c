//! 工具调用 JSON Schema 生成（schemars）
//!
//! 各动作参数的 JSON 结构随动作目录注入 navigator prompt，减少 Oracle 输出格式错误。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// ascend 参数
#[allow(dead_code)]
#[derive(JsonSchema)]
pub struct AscendArgs {
    /// 目标高度（米，> 0）
    pub altitude: f64,
}

/// move 参数（NED 相对位移，米）
#[allow(dead_code)]
#[derive(JsonSchema)]
pub struct MoveArgs {
    /// 向北为正
    pub north: f64,
    /// 向东为正
    pub east: f64,
    /// 向下为正（上升用负值）
    pub down: f64,
}

/// 无参数动作
#[allow(dead_code)]
#[derive(JsonSchema)]
pub struct NoArgs {}

/// 某一参数类型的 JSON Schema
pub fn args_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null)
}
