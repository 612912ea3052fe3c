//! Annotator：为 mission-plan 写入一次性的场景标注
//!
//! 对 context 为空的计划领取处理权，抓取一帧相机图像交给视觉 Oracle 描述，写回计划后释放。
//! 相机或 Oracle 失败时写入占位描述，任务照常继续。标注对整个计划只计算一次，后续步骤不会刷新。

use std::sync::Arc;

use async_trait::async_trait;

use crate::actuator::FrameSource;
use crate::agents::runner::{try_claim, Agent};
use crate::board::{Blackboard, BoardError, BoardEvent, MessageId, MessageKind};
use crate::core::AgentError;
use crate::llm::{BoundedOracle, OracleRequest, Purpose};
use crate::memory::Message;

/// 描述不可用时的标注前缀
pub const UNAVAILABLE_PREFIX: &str = "scene description unavailable";

pub struct Annotator {
    oracle: BoundedOracle,
    prompt: String,
    camera: Option<Arc<dyn FrameSource>>,
}

impl Annotator {
    pub const NAME: &'static str = "annotator";

    pub fn new(oracle: BoundedOracle, prompt: impl Into<String>) -> Self {
        Self {
            oracle,
            prompt: prompt.into(),
            camera: None,
        }
    }

    pub fn with_camera(mut self, camera: Arc<dyn FrameSource>) -> Self {
        self.camera = Some(camera);
        self
    }

    /// 抓帧并请求描述；任何失败都转成占位文本
    pub async fn describe_scene(&self) -> String {
        match self.try_describe().await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => format!("{UNAVAILABLE_PREFIX}: empty description"),
            Err(e) => {
                tracing::warn!("scene description failed: {}", e);
                format!("{UNAVAILABLE_PREFIX}: {e}")
            }
        }
    }

    async fn try_describe(&self) -> Result<String, AgentError> {
        let camera = self
            .camera
            .as_ref()
            .ok_or_else(|| AgentError::CameraError("no camera configured".to_string()))?;
        let frame = camera.capture().await?;
        let request = OracleRequest::new(Purpose::Describe, vec![Message::user(self.prompt.clone())])
            .with_image(frame);
        self.oracle.ask(&request).await
    }

    async fn annotate_plan(&self, board: &Blackboard, id: MessageId) -> Result<(), AgentError> {
        let Some(message) = board.get(id) else {
            return Ok(());
        };
        match message.as_mission_plan() {
            Some(plan) if !plan.is_annotated() && !message.executed => {}
            _ => return Ok(()),
        }
        if try_claim(board, id, Self::NAME)?.is_none() {
            return Ok(());
        }

        let context = self.describe_scene().await;
        let written = board.annotate(id, context.clone());
        board.release(id)?;
        match written {
            Ok(()) => {
                tracing::info!(plan = %id, context = %context, "mission plan annotated");
                Ok(())
            }
            Err(BoardError::AlreadyAnnotated(_)) => {
                tracing::debug!(plan = %id, "plan already annotated, keeping first context");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Agent for Annotator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interests(&self) -> &[MessageKind] {
        &[MessageKind::MissionPlan]
    }

    async fn handle(&self, board: &Blackboard, event: &BoardEvent) -> Result<(), AgentError> {
        match event {
            BoardEvent::Posted { id, .. } | BoardEvent::Updated { id, .. } => {
                self.annotate_plan(board, *id).await
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::agents::prompts::PromptSet;
    use crate::board::{MissionPlan, MissionStep};
    use crate::llm::{ImageFrame, MockOracle};

    fn annotator(mock: MockOracle) -> (Annotator, Arc<MockOracle>) {
        let mock = Arc::new(mock);
        let oracle = BoundedOracle::new(mock.clone(), Duration::from_secs(1));
        (Annotator::new(oracle, PromptSet::default().vision), mock)
    }

    fn posted(board: &Blackboard, id: MessageId) -> BoardEvent {
        board.get(id).unwrap().posted_event()
    }

    #[tokio::test]
    async fn test_annotates_exactly_once() {
        let (annotator, mock) = annotator(MockOracle::new());
        let annotator = annotator.with_camera(Arc::new(ImageFrame::jpeg(vec![0xff, 0xd8])));
        let board = Blackboard::new();
        let id = board.post(MissionPlan::new(vec![MissionStep::new(1, "takeoff")]));

        annotator.handle(&board, &posted(&board, id)).await.unwrap();
        annotator
            .handle(&board, &BoardEvent::Updated { id, kind: MessageKind::MissionPlan })
            .await
            .unwrap();

        let message = board.get(id).unwrap();
        assert_eq!(
            message.as_mission_plan().unwrap().context.as_deref(),
            Some("Open area straight ahead, no obstacles nearby.")
        );
        assert!(message.claimed_by.is_none());
        assert!(!message.executed);
        assert_eq!(mock.calls(Purpose::Describe), 1);
        assert!(mock.requests()[0].image.is_some());
    }

    #[tokio::test]
    async fn test_failures_yield_placeholder() {
        let (annotator, mock) = annotator(MockOracle::new());
        let board = Blackboard::new();
        let id = board.post(MissionPlan::new(vec![MissionStep::new(1, "takeoff")]));
        annotator.handle(&board, &posted(&board, id)).await.unwrap();
        let context = board.get(id).unwrap().as_mission_plan().unwrap().context.clone().unwrap();
        assert!(context.starts_with(UNAVAILABLE_PREFIX));
        assert!(context.contains("no camera configured"));
        assert_eq!(mock.calls(Purpose::Describe), 0);

        let (annotator, _) = annotator_failing();
        let id = board.post(MissionPlan::new(vec![MissionStep::new(1, "land")]));
        annotator.handle(&board, &posted(&board, id)).await.unwrap();
        let context = board.get(id).unwrap().as_mission_plan().unwrap().context.clone().unwrap();
        assert!(context.contains("vision model offline"));
    }

    fn annotator_failing() -> (Annotator, Arc<MockOracle>) {
        let (annotator, mock) = annotator(MockOracle::new().failing(Purpose::Describe, "vision model offline"));
        (annotator.with_camera(Arc::new(ImageFrame::jpeg(vec![1]))), mock)
    }
}
