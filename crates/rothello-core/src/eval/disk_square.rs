//! 石位置の重み＋着手可能数による評価関数
//!
//! 重みの和は差分更新し、着手可能数は評価時に計算する。

use crate::board::{Position, legal_moves};
use crate::types::{MAX_SCORE, MIN_SCORE, Score};

use super::Evaluator;

/// マスごとの重み（8対称）
#[rustfmt::skip]
pub const SQUARE_WEIGHTS: [i32; 64] = [
    100, -20,  10,   5,   5,  10, -20, 100,
    -20, -50,  -2,  -2,  -2,  -2, -50, -20,
     10,  -2,  -1,  -1,  -1,  -1,  -2,  10,
      5,  -2,  -1,  -1,  -1,  -1,  -2,   5,
      5,  -2,  -1,  -1,  -1,  -1,  -2,   5,
     10,  -2,  -1,  -1,  -1,  -1,  -2,  10,
    -20, -50,  -2,  -2,  -2,  -2, -50, -20,
    100, -20,  10,   5,   5,  10, -20, 100,
];

/// 重み和1あたりのスコア
const WEIGHT_SCALE: i32 = 4;
/// 着手可能数の差1あたりのスコア
const MOBILITY_SCALE: i32 = 60;

#[inline]
fn weight_sum(mut bb: u64) -> i32 {
    let mut sum = 0;
    while bb != 0 {
        sum += SQUARE_WEIGHTS[bb.trailing_zeros() as usize];
        bb &= bb - 1;
    }
    sum
}

/// 石位置＋着手可能数の評価関数
#[derive(Debug, Clone, Default)]
pub struct DiskSquareEvaluator {
    player: u64,
    opponent: u64,
    /// 手番側の重み和 − 相手側の重み和
    weights: i32,
}

impl DiskSquareEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 差分更新ではなく盤面から直接計算した重み差（検証用）
    pub fn weights_from_scratch(&self) -> i32 {
        weight_sum(self.player) - weight_sum(self.opponent)
    }
}

impl Evaluator for DiskSquareEvaluator {
    fn setup(&mut self, pos: &Position) {
        self.player = pos.player();
        self.opponent = pos.opponent();
        self.weights = self.weights_from_scratch();
    }

    fn eval(&self) -> Score {
        let mobility = legal_moves(self.player, self.opponent).count_ones() as i32
            - legal_moves(self.opponent, self.player).count_ones() as i32;
        (self.weights * WEIGHT_SCALE + mobility * MOBILITY_SCALE).clamp(MIN_SCORE, MAX_SCORE)
    }

    fn update(&mut self, square: u32, flips: u64) {
        let placed = 1u64 << square;
        let gained = SQUARE_WEIGHTS[square as usize] + 2 * weight_sum(flips);
        let new_player = self.opponent ^ flips;
        let new_opponent = self.player | flips | placed;
        self.player = new_player;
        self.opponent = new_opponent;
        self.weights = -(self.weights + gained);
    }

    fn undo(&mut self, square: u32, flips: u64) {
        let placed = 1u64 << square;
        let gained = SQUARE_WEIGHTS[square as usize] + 2 * weight_sum(flips);
        let old_player = self.opponent & !(flips | placed);
        let old_opponent = self.player | flips;
        self.player = old_player;
        self.opponent = old_opponent;
        self.weights = -self.weights - gained;
    }

    fn invert(&mut self) {
        std::mem::swap(&mut self.player, &mut self.opponent);
        self.weights = -self.weights;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Symmetry;

    #[test]
    fn test_weights_are_symmetric() {
        for s in Symmetry::ALL {
            for sq in 0..64u32 {
                let image = s.apply(1u64 << sq).trailing_zeros() as usize;
                assert_eq!(SQUARE_WEIGHTS[sq as usize], SQUARE_WEIGHTS[image]);
            }
        }
    }

    #[test]
    fn test_initial_eval_is_zero() {
        let mut ev = DiskSquareEvaluator::new();
        ev.setup(&Position::initial());
        assert_eq!(ev.eval(), 0);
    }

    #[test]
    fn test_update_undo_matches_setup() {
        let pos = Position::initial();
        let mut ev = DiskSquareEvaluator::new();
        ev.setup(&pos);
        for (mv, flips) in pos.moves() {
            let sq = mv.square().unwrap();
            let child = pos.play_with_flips(sq, flips);
            ev.update(sq, flips);
            let mut fresh = DiskSquareEvaluator::new();
            fresh.setup(&child);
            assert_eq!(ev.eval(), fresh.eval());
            assert_eq!(ev.weights, ev.weights_from_scratch());
            ev.undo(sq, flips);
            assert_eq!(ev.eval(), 0);
            assert_eq!(ev.player, pos.player());
            assert_eq!(ev.opponent, pos.opponent());
        }
    }

    #[test]
    fn test_invert_negates() {
        let pos = Position::initial().play(crate::types::Move::from_text("d3").unwrap()).unwrap();
        let mut ev = DiskSquareEvaluator::new();
        ev.setup(&pos);
        let v = ev.eval();
        ev.invert();
        assert_eq!(ev.eval(), -v);
    }
}
