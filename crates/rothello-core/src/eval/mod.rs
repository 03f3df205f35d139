//! 深さ1評価関数
//!
//! 探索コアは評価関数を `Evaluator` トレイトを通してのみ扱う。
//! 学習済みパターン評価などの実装はこの契約を満たせば差し替えられる。

mod disk_square;

pub use disk_square::{DiskSquareEvaluator, SQUARE_WEIGHTS};

use crate::board::Position;
use crate::types::Score;

/// 差分更新可能な深さ1評価関数
///
/// 評価値は常に現在の手番側から見たスコア（石差 ×100）で、
/// `MIN_SCORE..=MAX_SCORE` に収まる。
pub trait Evaluator: Send {
    /// 局面を丸ごと設定
    fn setup(&mut self, pos: &Position);

    /// 現在局面の評価値
    fn eval(&self) -> Score;

    /// 手番側の着手 `square`（裏返しマスク `flips`）を適用し、視点を相手側へ移す
    fn update(&mut self, square: u32, flips: u64);

    /// `update` を取り消す
    fn undo(&mut self, square: u32, flips: u64);

    /// パス: 盤面は変えず視点のみ入れ替える
    fn invert(&mut self);
}
