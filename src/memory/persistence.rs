//! 案例库持久化
//!
//! 每条 CaseRecord 以一行 JSON 追加到文件；启动时整体加载，flush 时按 max_entries 压缩重写。

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::AgentError;
use crate::memory::{CaseMemory, CaseRecord, InMemoryCaseMemory};

/// JSONL 文件持久化的案例库（检索由内存索引完成）
pub struct FileCaseMemory {
    path: PathBuf,
    index: InMemoryCaseMemory,
}

impl FileCaseMemory {
    /// 打开案例库；文件不存在时为空，损坏的行被跳过并记录 warn
    pub fn open(path: impl AsRef<Path>, max_entries: usize) -> Result<Self, AgentError> {
        let path = path.as_ref().to_path_buf();
        let index = InMemoryCaseMemory::new(max_entries);
        if path.exists() {
            let data = std::fs::read_to_string(&path)
                .map_err(|e| AgentError::CaseMemoryError(format!("read {}: {e}", path.display())))?;
            for (lineno, line) in data.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<CaseRecord>(line) {
                    Ok(record) => index.insert(record),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        line = lineno + 1,
                        "skipping corrupt case record: {}",
                        e
                    ),
                }
            }
            tracing::info!(path = %path.display(), records = index.len(), "case memory loaded");
        }
        Ok(Self { path, index })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &CaseRecord) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AgentError::CaseMemoryError(e.to_string()))?;
        }
        let line = serde_json::to_string(record)
            .map_err(|e| AgentError::CaseMemoryError(e.to_string()))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AgentError::CaseMemoryError(format!("open {}: {e}", self.path.display())))?;
        writeln!(file, "{line}").map_err(|e| AgentError::CaseMemoryError(e.to_string()))
    }
}

impl CaseMemory for FileCaseMemory {
    fn store(&self, record: CaseRecord) -> Result<(), AgentError> {
        self.append(&record)?;
        self.index.insert(record);
        Ok(())
    }

    fn search(&self, query: &str, top_k: usize) -> Vec<String> {
        self.index.search(query, top_k)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    /// 用内存中保留的记录重写文件，丢弃已被淘汰的旧记录
    fn flush(&self) -> Result<(), AgentError> {
        let mut out = String::new();
        for record in self.index.records() {
            let line = serde_json::to_string(&record)
                .map_err(|e| AgentError::CaseMemoryError(e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        std::fs::write(&self.path, out)
            .map_err(|e| AgentError::CaseMemoryError(format!("write {}: {e}", self.path.display())))
    }
}
