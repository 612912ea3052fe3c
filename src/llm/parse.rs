//! Oracle 文本中的 JSON 提取
//!
//! 依次尝试：```json 围栏块、首个 `[` 或 `{` 到与之对应的最后一个闭合符号；均无则返回 None。

/// 从 Oracle 回复中截取 JSON 片段（不校验合法性）
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        if let Some(end) = rest.find("```") {
            let inner = rest[..end].trim();
            if inner.starts_with('[') || inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let open = trimmed.find(['[', '{'])?;
    let close = match trimmed.as_bytes()[open] {
        b'[' => ']',
        _ => '}',
    };
    let end = trimmed.rfind(close)?;
    (end > open).then(|| &trimmed[open..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_array() {
        assert_eq!(extract_json(r#" [{"id":1}] "#), Some(r#"[{"id":1}]"#));
    }

    #[test]
    fn test_fenced_block() {
        let text = "Here is the plan:\n```json\n[{\"id\": 1, \"goal\": \"takeoff\"}]\n```\nGood luck";
        assert_eq!(extract_json(text), Some(r#"[{"id": 1, "goal": "takeoff"}]"#));
    }

    #[test]
    fn test_unlabelled_fence() {
        let text = "```\n{\"tool\": \"land\"}\n```";
        assert_eq!(extract_json(text), Some(r#"{"tool": "land"}"#));
    }

    #[test]
    fn test_object_in_prose() {
        let text = r#"I will call {"tool": "land", "args": {}} now."#;
        assert_eq!(extract_json(text), Some(r#"{"tool": "land", "args": {}}"#));
    }

    #[test]
    fn test_no_json() {
        assert_eq!(extract_json("approved"), None);
        assert_eq!(extract_json("unbalanced { here"), None);
    }
}
