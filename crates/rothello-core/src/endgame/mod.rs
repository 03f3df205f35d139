//! 終盤完全読みソルバー
//!
//! 探索コアから見た完全読みソルバーは狭い関数呼び出し境界の向こうにある協調者で、
//! `(局面, 下限, 上限) -> (スコア, 探索ノード数)` の契約のみに依存する。
//! あわせて、確率的探索の葉で証明数・反証数を見積もるためのコスト推定フックを提供する。

mod cost;
mod native;

pub use cost::{EndgameCostModel, MAX_PROOF_NUMBER, MIN_PROOF_NUMBER};
pub use native::NativeExactSolver;

use crate::board::Position;
use crate::types::Score;

/// 完全読みの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactResult {
    /// スコア（fail-soft: `lower < score < upper` のときのみ正確な値）
    pub score: Score,
    /// 探索ノード数
    pub nodes: u64,
}

/// 終盤完全読みソルバーの契約
pub trait ExactSolver: Send + Sync {
    /// 窓 `(lower, upper)` で完全読みする
    ///
    /// 戻り値が `lower` 以下なら真の値はそれ以下、`upper` 以上なら真の値はそれ以上。
    fn solve(&self, pos: &Position, lower: Score, upper: Score) -> ExactResult;

    /// 「スコア > target」を証明するのに必要な完全読みノード数の見積もり
    fn proof_number(&self, pos: &Position, target: Score, estimate: Score) -> f32;

    /// 「スコア < target」を証明する（反証する）のに必要な完全読みノード数の見積もり
    fn disproof_number(&self, pos: &Position, target: Score, estimate: Score) -> f32;
}
