//! Oracle 层：抽象、超时包装与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod bounded;
pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod parse;
pub mod traits;

pub use bounded::BoundedOracle;
pub use deepseek::{create_deepseek_oracle, DEEPSEEK_CHAT};
pub use mock::MockOracle;
pub use openai::{OpenAiOracle, TokenUsage};
pub use parse::extract_json;
pub use traits::{ImageFrame, Oracle, OracleRequest, Purpose};
