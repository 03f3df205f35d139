//! 完全読みソルバーのネイティブ実装
//!
//! 置換表を使わない素朴な fail-soft negamax。浅い終盤（空きマス十数個以下）専用。

use crate::board::{Position, flips, legal_moves};
use crate::types::{EVAL_SCALE, Score};

use super::{EndgameCostModel, ExactResult, ExactSolver};

/// 隅 → 辺 → その他の順で着手を試すための優先マスク
const CORNERS: u64 = 0x8100_0000_0000_0081;
const X_SQUARES: u64 = 0x0042_0000_0000_4200;
const C_SQUARES: u64 = 0x4281_0000_0000_8142;

/// 完全読みソルバー
#[derive(Debug, Clone, Default)]
pub struct NativeExactSolver {
    cost: EndgameCostModel,
}

impl NativeExactSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 石差単位の negamax
    fn negamax(player: u64, opponent: u64, mut alpha: i32, beta: i32, nodes: &mut u64) -> i32 {
        *nodes += 1;
        let moves = legal_moves(player, opponent);
        if moves == 0 {
            if legal_moves(opponent, player) == 0 {
                return Position::new(player, opponent).final_score() / EVAL_SCALE;
            }
            return -Self::negamax(opponent, player, -beta, -alpha, nodes);
        }

        let mut best = -65;
        for group in [moves & CORNERS, moves & !(CORNERS | X_SQUARES | C_SQUARES), moves & C_SQUARES, moves & X_SQUARES] {
            let mut remaining = group;
            while remaining != 0 {
                let sq = remaining.trailing_zeros();
                remaining &= remaining - 1;
                let flipped = flips(player, opponent, sq);
                let placed = 1u64 << sq;
                let v = -Self::negamax(
                    opponent ^ flipped,
                    player | flipped | placed,
                    -beta,
                    -alpha,
                    nodes,
                );
                if v > best {
                    best = v;
                    if v > alpha {
                        alpha = v;
                        if v >= beta {
                            return best;
                        }
                    }
                }
            }
        }
        best
    }
}

impl ExactSolver for NativeExactSolver {
    fn solve(&self, pos: &Position, lower: Score, upper: Score) -> ExactResult {
        // スコア窓を石差単位へ（窓を狭めない方向に丸める）
        let alpha = lower.div_euclid(EVAL_SCALE).max(-65);
        let beta = (upper + EVAL_SCALE - 1).div_euclid(EVAL_SCALE).min(65);
        let mut nodes = 0;
        let disks = Self::negamax(pos.player(), pos.opponent(), alpha, beta.max(alpha + 1), &mut nodes);
        ExactResult {
            score: disks * EVAL_SCALE,
            nodes,
        }
    }

    fn proof_number(&self, pos: &Position, target: Score, estimate: Score) -> f32 {
        self.cost.proof_number(pos, target, estimate)
    }

    fn disproof_number(&self, pos: &Position, target: Score, estimate: Score) -> f32 {
        self.cost.disproof_number(pos, target, estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MAX_SCORE, MIN_SCORE};

    /// 窓なしの全幅 minimax（検証用）
    fn minimax(pos: &Position) -> Score {
        let moves = pos.legal_moves();
        if moves == 0 {
            if pos.opponent_moves() == 0 {
                return pos.final_score();
            }
            return -minimax(&pos.pass());
        }
        pos.moves()
            .map(|(mv, f)| -minimax(&pos.play_with_flips(mv.square().unwrap(), f)))
            .max()
            .unwrap()
    }

    fn endgame_position() -> Position {
        // 空き5マスの終盤局面
        Position::from_text(
            "XXXXXXXO\
             XXXXXXOO\
             XXOXXOXO\
             XOXXOXXO\
             XXOOXXXO\
             XXXOXO-O\
             XXXXO--O\
             XXXXX--O",
        )
        .unwrap()
    }

    #[test]
    fn test_solve_matches_minimax_full_window() {
        let pos = endgame_position();
        let solver = NativeExactSolver::new();
        let result = solver.solve(&pos, MIN_SCORE, MAX_SCORE);
        assert_eq!(result.score, minimax(&pos));
        assert!(result.nodes > 0);
    }

    #[test]
    fn test_solve_fail_soft_bounds() {
        let pos = endgame_position();
        let exact = minimax(&pos);
        let solver = NativeExactSolver::new();
        let hi = solver.solve(&pos, exact + 200, exact + 400);
        assert!(hi.score <= exact + 200);
        assert!(hi.score >= exact);
        let lo = solver.solve(&pos, exact - 400, exact - 200);
        assert!(lo.score >= exact - 200);
        assert!(lo.score <= exact);
    }

    #[test]
    fn test_game_over_position() {
        let full = Position::new(0x0000_0000_ffff_ffff, 0xffff_ffff_0000_0000);
        let solver = NativeExactSolver::new();
        assert_eq!(solver.solve(&full, MIN_SCORE, MAX_SCORE).score, 0);
    }
}
