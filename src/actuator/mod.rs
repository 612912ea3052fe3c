//! 外部执行能力：无人机控制服务与相机帧来源

pub mod camera;
pub mod http;
pub mod recording;

use async_trait::async_trait;

use crate::board::DroneAction;

pub use camera::{FileCamera, FrameSource, HttpCamera};
pub use http::HttpActuator;
pub use recording::RecordingActuator;

/// 无人机控制面：三条固定命令，Ok/Err 均为面向人的文本
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn ascend(&self, altitude: f64) -> Result<String, String>;

    async fn move_by(&self, north: f64, east: f64, down: f64) -> Result<String, String>;

    async fn land(&self) -> Result<String, String>;

    /// 按动作分发到对应命令
    async fn execute(&self, action: &DroneAction) -> Result<String, String> {
        match action {
            DroneAction::Ascend { altitude } => self.ascend(*altitude).await,
            DroneAction::Move { north, east, down } => self.move_by(*north, *east, *down).await,
            DroneAction::Land => self.land().await,
        }
    }
}
