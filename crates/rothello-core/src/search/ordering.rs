//! 手順付け
//!
//! 1. 置換表の最善手・次善手
//! 2. 完全読みモードで空きマスが多いとき: 子局面の反証数の見積もり（小さいほど先）
//! 3. それ以外: 相手の着手可能数（少ないほど先）とマスの重み

use smallvec::SmallVec;

use crate::board::Position;
use crate::eval::SQUARE_WEIGHTS;
use crate::types::Move;

/// 手順付け済みの指し手
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OrderedMove {
    pub square: u32,
    pub flips: u64,
    pub key: i32,
}

pub(crate) type MoveList = SmallVec<[OrderedMove; 32]>;

const BEST_MOVE_KEY: i32 = i32::MAX;
const SECOND_MOVE_KEY: i32 = i32::MAX - 1;

/// 置換表ヒントの順位値
#[inline]
pub(crate) fn hint_key(mv: Move, best: Move, second: Move) -> Option<i32> {
    if mv == best {
        Some(BEST_MOVE_KEY)
    } else if mv == second {
        Some(SECOND_MOVE_KEY)
    } else {
        None
    }
}

/// 静的な順位値: 相手の着手可能数を減らし、良いマスを取る手を優先
#[inline]
pub(crate) fn static_key(child: &Position, square: u32, mobility_weight: i32) -> i32 {
    -(child.mobility() as i32) * mobility_weight + SQUARE_WEIGHTS[square as usize]
}

/// 反証数の見積もりから求める順位値（小さいほど優先）
#[inline]
pub(crate) fn cost_key(disproof_number: f32) -> i32 {
    -(f64::from(disproof_number.max(1.0)).ln() * 1000.0) as i32
}

/// 順位値の降順に並べる（同値は元の順序を保つ）
pub(crate) fn sort_moves(moves: &mut MoveList) {
    moves.sort_by(|a, b| b.key.cmp(&a.key));
}
