//! 置換表エントリ

use crate::board::Position;
use crate::types::{MAX_SCORE, MIN_SCORE, Move, Score};

/// 置換表エントリ
///
/// 下界・上界は初期値（ゲームの最小・最大スコア）から単調に狭まる。
/// ただしより深い探索の結果は浅い探索の境界を置き換える。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TTEntry {
    pub key: Position,
    pub lower: Score,
    pub upper: Score,
    pub depth_lower: u8,
    pub depth_upper: u8,
    pub best_move: Move,
    pub second_best_move: Move,
}

impl TTEntry {
    /// 境界なしの新規エントリ
    pub const fn new(key: Position) -> Self {
        Self {
            key,
            lower: MIN_SCORE,
            upper: MAX_SCORE,
            depth_lower: 0,
            depth_upper: 0,
            best_move: Move::NONE,
            second_best_move: Move::NONE,
        }
    }

    /// 探索結果を反映する
    ///
    /// `value` は窓 `(alpha, beta)` での fail-soft 探索結果。
    pub fn update(&mut self, depth: u8, alpha: Score, beta: Score, value: Score, best_move: Move) {
        if value > alpha {
            // 真の値 >= value
            if depth > self.depth_lower {
                self.lower = value;
                self.depth_lower = depth;
            } else if depth == self.depth_lower {
                self.lower = self.lower.max(value);
            }
        }
        if value < beta {
            // 真の値 <= value
            if depth > self.depth_upper {
                self.upper = value;
                self.depth_upper = depth;
            } else if depth == self.depth_upper {
                self.upper = self.upper.min(value);
            }
        }
        if !best_move.is_none() && best_move != self.best_move {
            self.second_best_move = self.best_move;
            self.best_move = best_move;
        }
    }

    /// 置換の優先度（小さいほど置換されやすい）
    #[inline]
    pub fn worth(&self) -> u8 {
        self.depth_lower.max(self.depth_upper)
    }

    /// 深さ `depth` 以上で得られた境界のみを取り出す
    pub fn probe(&self, depth: u8) -> ProbeResult {
        ProbeResult {
            lower: if self.depth_lower >= depth { self.lower } else { MIN_SCORE },
            upper: if self.depth_upper >= depth { self.upper } else { MAX_SCORE },
            best_move: self.best_move,
            second_best_move: self.second_best_move,
        }
    }
}

/// probe結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    /// 要求深さを満たす下界（なければ `MIN_SCORE`）
    pub lower: Score,
    /// 要求深さを満たす上界（なければ `MAX_SCORE`）
    pub upper: Score,
    /// 最善手ヒント
    pub best_move: Move,
    /// 次善手ヒント
    pub second_best_move: Move,
}
