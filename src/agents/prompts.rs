//! Prompt 模板：优先读取 config/prompts/*.txt，否则使用内置默认
//!
//! 占位符以 `{name}` 表示，由 `render` 逐个替换；未提供的占位符保持原样。

use std::path::{Path, PathBuf};

const DEFAULT_PLANNER: &str = r#"You are the mission planner of a drone. Turn the operator instruction into a list of small, clear steps describing WHAT the drone must do, not how.

Operator instruction:
"{instruction}"

Recent step verdicts:
{history}

Similar past missions:
{prior_outcomes}

Return a JSON list only. Each step has a number and a goal, for example:
[
  {"id": 1, "goal": "Take off"},
  {"id": 2, "goal": "Fly 10 m west"},
  {"id": 3, "goal": "Land"}
]"#;

const DEFAULT_VISION: &str = r#"You are the vision unit assisting a drone navigator. You receive one frame from the on-board camera.
Describe only what matters for navigation, not object type or colour:
- position relative to the camera (straight ahead, on the left, lower right corner),
- approximate distance (close, medium, far),
- size in the frame (small, large, fills most of the frame).
Answer in at most 3 sentences."#;

const DEFAULT_NAVIGATOR: &str = r#"You are the drone navigator. Choose the actions that accomplish one mission step.

Mission step: {goal}
Vision context: {context}

Available actions:
{actions}

Argument schemas:
{schema}

Reply with JSON only: {"tool": "<action>", "args": {...}} or a list of such objects, in execution order.
Reply with an empty list [] if no action is needed."#;

const DEFAULT_GUARDIAN: &str = r#"You are the guardian of a drone. Check whether the navigator's planned action is sensible and correct for the mission step.

Mission step: {goal}
Vision context: {context}
Planned action: {action}
Parameters: {parameters}

Answer only 'approved' if the action is sensible and correct. Otherwise briefly state why you reject it."#;

/// 四个 Agent 使用的模板
#[derive(Clone, Debug)]
pub struct PromptSet {
    pub planner: String,
    pub vision: String,
    pub navigator: String,
    pub guardian: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            planner: DEFAULT_PLANNER.to_string(),
            vision: DEFAULT_VISION.to_string(),
            navigator: DEFAULT_NAVIGATOR.to_string(),
            guardian: DEFAULT_GUARDIAN.to_string(),
        }
    }
}

impl PromptSet {
    /// 在 config/prompts 与 ../config/prompts 中查找模板文件
    pub fn load() -> Self {
        Self::load_from(&[PathBuf::from("config/prompts"), PathBuf::from("../config/prompts")])
    }

    pub fn load_from(dirs: &[PathBuf]) -> Self {
        let defaults = Self::default();
        Self {
            planner: read_template(dirs, "planner.txt").unwrap_or(defaults.planner),
            vision: read_template(dirs, "vision.txt").unwrap_or(defaults.vision),
            navigator: read_template(dirs, "navigator.txt").unwrap_or(defaults.navigator),
            guardian: read_template(dirs, "guardian.txt").unwrap_or(defaults.guardian),
        }
    }
}

fn read_template(dirs: &[PathBuf], file: &str) -> Option<String> {
    dirs.iter().find_map(|dir| {
        let path: &Path = dir.as_ref();
        let text = std::fs::read_to_string(path.join(file)).ok()?;
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            tracing::debug!(template = file, dir = %path.display(), "prompt template loaded");
            Some(text.to_string())
        }
    })
}

/// 单遍替换模板中的 `{name}` 占位符；插入的值不会再被展开，未知占位符原样保留
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let value = tail.find('}').and_then(|close| {
            let name = &tail[..close];
            vars.iter()
                .find(|(n, _)| *n == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
