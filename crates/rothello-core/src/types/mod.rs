//! 基本型
//!
//! - `Score`: 石差 ×100 のスコア
//! - スコアターゲット（確率を管理する離散化された閾値）
//! - `Move`: 着手（マス番号またはパス）

mod moves;
mod score;

pub use moves::Move;
pub use score::*;
