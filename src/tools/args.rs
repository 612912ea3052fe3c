//! 工具调用解析与参数规范化
//!
//! Oracle 返回的工具调用可能是单个 `{"tool": .., "args": ..}`、它们的数组，或 `{"tool_calls": [..]}`。
//! 参数编码宽松：高度可为数字、数字字符串或 `{"altitude": ..}`；
//! 位移可为 "5,0,0" / "5 0 0"、[5, 0, 0] 或 `{"north": .., "east": .., "down": ..}`，统一规范化为三元组。

use serde::Deserialize;
use serde_json::Value;

use crate::board::DroneAction;
use crate::core::AgentError;
use crate::llm::extract_json;

/// 未指定高度时的起飞高度（米）
pub const DEFAULT_ALTITUDE: f64 = 2.0;

/// Oracle 给出的一次工具调用（未校验）
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolInvocation {
    #[serde(alias = "name", alias = "action")]
    pub tool: String,
    #[serde(default, alias = "arguments", alias = "parameters")]
    pub args: Value,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

/// 从 Oracle 文本中解析工具调用；没有 JSON 时视为不调用任何工具
pub fn parse_invocations(output: &str) -> Result<Vec<ToolInvocation>, AgentError> {
    let Some(json_str) = extract_json(output) else {
        return Ok(Vec::new());
    };
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("tool_calls") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(AgentError::JsonParseError(format!(
                    "tool_calls is not a list: {other}"
                )))
            }
            None => vec![Value::Object(map)],
        },
        other => {
            return Err(AgentError::JsonParseError(format!(
                "expected tool call object, got {other}"
            )))
        }
    };

    items
        .into_iter()
        .map(|item| {
            let item = unwrap_function_call(item);
            serde_json::from_value::<ToolInvocation>(item.clone())
                .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, item)))
        })
        .collect()
}

/// OpenAI 风格 `{"function": {"name": .., "arguments": "<json>"}}` 展开为扁平调用
fn unwrap_function_call(item: Value) -> Value {
    let Some(function) = item.get("function") else {
        return item;
    };
    let name = function.get("name").cloned().unwrap_or(Value::Null);
    let args = match function.get("arguments") {
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or(Value::String(raw.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    };
    serde_json::json!({ "tool": name, "args": args })
}

/// 把工具调用规范化为 DroneAction；未知工具返回 UnknownAction，参数非法返回 InvalidArguments
pub fn normalize(invocation: &ToolInvocation) -> Result<DroneAction, AgentError> {
    let name = invocation.tool.trim().to_lowercase();
    match name.as_str() {
        "ascend" | "takeoff" | "take_off" | "ascend_to_altitude" => {
            Ok(DroneAction::Ascend {
                altitude: altitude_arg(&invocation.args)?,
            })
        }
        "move" | "fly_to" | "flyto" | "goto_relative" | "move_by" | "move_relative" => {
            let [north, east, down] = offset_args(&invocation.args)?;
            Ok(DroneAction::Move { north, east, down })
        }
        "land" | "descend" | "descend_and_land" => Ok(DroneAction::Land),
        _ => Err(AgentError::UnknownAction(invocation.tool.clone())),
    }
}

fn invalid(action: &str, reason: impl Into<String>) -> AgentError {
    AgentError::InvalidArguments {
        action: action.to_string(),
        reason: reason.into(),
    }
}

/// 数字或数字字符串 -> 有限 f64
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn altitude_arg(args: &Value) -> Result<f64, AgentError> {
    let raw = match args {
        Value::Null => return Ok(DEFAULT_ALTITUDE),
        Value::Object(map) if map.is_empty() => return Ok(DEFAULT_ALTITUDE),
        Value::Object(map) => map
            .get("altitude")
            .or_else(|| map.get("height"))
            .or_else(|| map.get("alt"))
            .ok_or_else(|| invalid("ascend", "missing altitude"))?,
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    };
    let altitude =
        number(raw).ok_or_else(|| invalid("ascend", format!("altitude must be a number, got {raw}")))?;
    if altitude <= 0.0 {
        return Err(invalid("ascend", format!("altitude must be positive, got {altitude}")));
    }
    Ok(altitude)
}

fn offset_args(args: &Value) -> Result<[f64; 3], AgentError> {
    let parts: Vec<Value> = match args {
        Value::String(s) => s
            .replace(',', " ")
            .split_whitespace()
            .map(|p| Value::String(p.to_string()))
            .collect(),
        Value::Array(items) => items.clone(),
        Value::Object(map) => {
            let mut parts = Vec::with_capacity(3);
            for key in ["north", "east", "down"] {
                let v = map
                    .get(key)
                    .ok_or_else(|| invalid("move", format!("missing {key}")))?;
                parts.push(v.clone());
            }
            parts
        }
        other => return Err(invalid("move", format!("unsupported argument encoding: {other}"))),
    };
    if parts.len() != 3 {
        return Err(invalid(
            "move",
            format!("expected 3 offsets (north, east, down), got {}", parts.len()),
        ));
    }
    let mut out = [0.0; 3];
    for (slot, (value, key)) in out.iter_mut().zip(parts.iter().zip(["north", "east", "down"])) {
        *slot = number(value)
            .ok_or_else(|| invalid("move", format!("{key} must be a number, got {value}")))?;
    }
    Ok(out)
}
