//! AI 决策模块：合法行动生成、分档决策与出牌阶段驱动。

pub mod agent;
pub mod driver;

pub use agent::{AiAction, AiActionKind, AiAgent, AiConfig, AiDecision, AiDifficulty};
pub use driver::{AiStep, AiTurn};
