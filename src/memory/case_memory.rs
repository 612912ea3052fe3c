//! 任务案例库：记录每次任务的成败与完整黑板历史，供后续规划检索
//!
//! 支持 record_outcome 与 search(query, k)；InMemoryCaseMemory 按关键词重叠排序，
//! FileCaseMemory（见 persistence）在其上追加 JSONL 持久化。

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board;
use crate::core::AgentError;

/// 一次任务的归档记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub success: bool,
    /// 可检索的文字摘要
    pub summary: String,
    /// 归档时黑板上的全部消息（JSON）
    pub history: serde_json::Value,
}

impl CaseRecord {
    pub fn new(
        success: bool,
        summary: impl Into<String>,
        history: &[board::Message],
    ) -> Result<Self, AgentError> {
        let history = serde_json::to_value(history)
            .map_err(|e| AgentError::CaseMemoryError(format!("serialize history: {e}")))?;
        Ok(Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            success,
            summary: summary.into(),
            history,
        })
    }

    /// 检索返回的文本：成败 + 摘要
    pub fn document(&self) -> String {
        format!("Mission success: {}\n{}", self.success, self.summary)
    }
}

/// 案例库 trait：写入与相似度检索
pub trait CaseMemory: Send + Sync {
    fn store(&self, record: CaseRecord) -> Result<(), AgentError>;

    /// 按查询检索最相关的 k 条，返回文本
    fn search(&self, query: &str, top_k: usize) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 落盘（内存实现无操作）
    fn flush(&self) -> Result<(), AgentError> {
        Ok(())
    }

    /// 归档一次任务：构建记录并写入
    fn record_outcome(
        &self,
        success: bool,
        summary: &str,
        history: &[board::Message],
    ) -> Result<CaseRecord, AgentError> {
        let record = CaseRecord::new(success, summary, history)?;
        self.store(record.clone())?;
        Ok(record)
    }
}

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// 内存实现：按关键词重叠检索，超出 max_entries 丢弃最旧记录
#[derive(Clone)]
pub struct InMemoryCaseMemory {
    store: Arc<RwLock<Vec<(CaseRecord, HashSet<String>)>>>,
    max_entries: usize,
}

impl InMemoryCaseMemory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(Vec::new())),
            max_entries,
        }
    }

    /// 当前全部记录（旧 -> 新）
    pub fn records(&self) -> Vec<CaseRecord> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }

    pub(crate) fn insert(&self, record: CaseRecord) {
        let tokens = tokenize_lower(&record.summary);
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.push((record, tokens));
        let n = store.len();
        if n > self.max_entries {
            store.drain(0..n - self.max_entries);
        }
    }
}

impl Default for InMemoryCaseMemory {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl CaseMemory for InMemoryCaseMemory {
    fn store(&self, record: CaseRecord) -> Result<(), AgentError> {
        self.insert(record);
        Ok(())
    }

    fn search(&self, query: &str, top_k: usize) -> Vec<String> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        let mut scored: Vec<(usize, usize, String)> = store
            .iter()
            .enumerate()
            .map(|(i, (record, tokens))| {
                (query_tokens.intersection(tokens).count(), i, record.document())
            })
            .filter(|(score, _, _)| *score > 0)
            .collect();
        // 分数相同时较新的记录优先
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        scored.into_iter().take(top_k).map(|(_, _, doc)| doc).collect()
    }

    fn len(&self) -> usize {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
