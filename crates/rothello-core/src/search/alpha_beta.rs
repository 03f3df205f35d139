//! Alpha-Beta探索の実装
//!
//! fail-soft negamax。
//! - Principal Variation Search（null window で探り、fail high したときだけ窓を広げて再探索）
//! - 置換表による境界カットと手順ヒント
//! - 完全読みモードでの確定石カットと、終盤ソルバーへの委譲
//!
//! パスは深さを消費しない。残り深さが空きマス数以上なら完全読みモードになる。

use std::sync::Arc;

use crate::board::{Position, squares};
use crate::endgame::ExactSolver;
use crate::eval::{DiskSquareEvaluator, Evaluator};
use crate::stability::stability_upper_bound;
use crate::tt::{EXACT_DEPTH, TranspositionTable};
use crate::types::{MAX_SCORE, Move, SCORE_INF, Score};

use super::ordering::{MoveList, OrderedMove, cost_key, hint_key, sort_moves, static_key};
use super::params::SearchParams;

/// Alpha-Beta ソルバー
///
/// 評価関数の差分更新状態を持つので、スレッドごとに1つ作る。
/// 置換表と終盤ソルバーはスレッド間で共有する。
pub struct AlphaBetaSolver<E: Evaluator = DiskSquareEvaluator> {
    evaluator: E,
    tt: Arc<TranspositionTable>,
    exact: Arc<dyn ExactSolver>,
    exact_solver_empties: u32,
    endgame_ordering_empties: u32,
    mobility_weight: i32,
    nodes: u64,
}

impl<E: Evaluator> AlphaBetaSolver<E> {
    pub fn new(
        evaluator: E,
        tt: Arc<TranspositionTable>,
        exact: Arc<dyn ExactSolver>,
        params: &SearchParams,
    ) -> Self {
        Self {
            evaluator,
            tt,
            exact,
            exact_solver_empties: params.exact_solver_empties,
            endgame_ordering_empties: params.endgame_ordering_empties,
            mobility_weight: params.mobility_weight,
            nodes: 0,
        }
    }

    /// 累計探索ノード数（終盤ソルバー内のノードを含む）
    #[inline]
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    pub fn reset_nodes(&mut self) {
        self.nodes = 0;
    }

    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    /// 深さ `depth` で窓 `(lower, upper)` の探索をする
    ///
    /// fail-soft: 戻り値 `v` について、`v <= lower` なら真の値は `v` 以下、
    /// `v >= upper` なら真の値は `v` 以上、その間なら正確な値。
    ///
    /// 置換表に `depth` 以上の深さの結果があればそれを使うので、
    /// 置換表を共有していると `depth` より深い探索の値が返ることがある。
    pub fn evaluate(&mut self, pos: &Position, depth: u32, lower: Score, upper: Score) -> Score {
        let lower = lower.clamp(-SCORE_INF, MAX_SCORE);
        let upper = upper.clamp(lower + 1, SCORE_INF);
        self.evaluator.setup(pos);
        self.negamax(pos, depth, lower, upper)
    }

    /// 窓なしで深さ `depth` の値を求める
    pub fn probe(&mut self, pos: &Position, depth: u32) -> Score {
        self.evaluate(pos, depth, -SCORE_INF, SCORE_INF)
    }

    /// 窓 `(lower, upper)` で完全読みする
    pub fn solve(&mut self, pos: &Position, lower: Score, upper: Score) -> Score {
        self.evaluate(pos, pos.empty_count(), lower, upper)
    }

    fn negamax(&mut self, pos: &Position, depth: u32, mut alpha: Score, beta: Score) -> Score {
        debug_assert!(alpha < beta);
        self.nodes += 1;

        let empties = pos.empty_count();
        let exact = depth >= empties;
        if !exact && depth == 0 {
            return if pos.is_game_over() { pos.final_score() } else { self.evaluator.eval() };
        }

        let moves = pos.legal_moves();
        if moves == 0 {
            if pos.opponent_moves() == 0 {
                return pos.final_score();
            }
            self.evaluator.invert();
            let value = -self.negamax(&pos.pass(), depth, -beta, -alpha);
            self.evaluator.invert();
            return value;
        }

        if exact {
            if empties <= self.exact_solver_empties {
                let result = self.exact.solve(pos, alpha, beta);
                self.nodes += result.nodes;
                return result.score;
            }
            let upper_bound = stability_upper_bound(pos);
            if upper_bound <= alpha {
                return upper_bound;
            }
        }

        let tt_depth = if exact { EXACT_DEPTH } else { depth.min(u32::from(EXACT_DEPTH) - 1) as u8 };
        let (best_hint, second_hint) = match self.tt.probe(pos, tt_depth) {
            Some(probe) => {
                if probe.lower >= beta || probe.lower == probe.upper {
                    return probe.lower;
                }
                if probe.upper <= alpha {
                    return probe.upper;
                }
                (probe.best_move, probe.second_best_move)
            }
            None => (Move::NONE, Move::NONE),
        };

        let list = self.ordered_moves(pos, moves, exact, alpha, best_hint, second_hint);
        let alpha_orig = alpha;
        let mut best = -SCORE_INF;
        let mut best_move = Move::NONE;
        for (i, m) in list.iter().enumerate() {
            let child = pos.play_with_flips(m.square, m.flips);
            self.evaluator.update(m.square, m.flips);
            let value = if i == 0 {
                -self.negamax(&child, depth - 1, -beta, -alpha)
            } else {
                let probe = -self.negamax(&child, depth - 1, -alpha - 1, -alpha);
                if probe > alpha && probe < beta {
                    -self.negamax(&child, depth - 1, -beta, -alpha)
                } else {
                    probe
                }
            };
            self.evaluator.undo(m.square, m.flips);

            if value > best {
                best = value;
                best_move = Move::from_square(m.square);
                if value > alpha {
                    alpha = value;
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        self.tt.update(pos, tt_depth, alpha_orig, beta, best, best_move);
        best
    }

    fn ordered_moves(
        &mut self,
        pos: &Position,
        moves: u64,
        exact: bool,
        alpha: Score,
        best: Move,
        second: Move,
    ) -> MoveList {
        let by_cost = exact && pos.empty_count() > self.endgame_ordering_empties;
        let mut list = MoveList::new();
        for square in squares(moves) {
            let flips = pos.flips(square);
            let key = match hint_key(Move::from_square(square), best, second) {
                Some(key) => key,
                None => {
                    let child = pos.play_with_flips(square, flips);
                    if by_cost {
                        self.evaluator.update(square, flips);
                        let estimate = self.evaluator.eval();
                        self.evaluator.undo(square, flips);
                        cost_key(self.exact.disproof_number(&child, -alpha, estimate))
                    } else {
                        static_key(&child, square, self.mobility_weight)
                    }
                }
            };
            list.push(OrderedMove { square, flips, key });
        }
        sort_moves(&mut list);
        list
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    use super::*;
    use crate::endgame::NativeExactSolver;
    use crate::types::MIN_SCORE;

    fn random_position(seed: u64, empties: u32) -> Position {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        loop {
            let mut pos = Position::initial();
            while pos.empty_count() > empties && !pos.is_game_over() {
                let moves: Vec<_> = pos.moves().collect();
                if moves.is_empty() {
                    pos = pos.pass();
                    continue;
                }
                let (mv, flips) = moves[rng.random_range(0..moves.len())];
                pos = pos.play_with_flips(mv.square().unwrap(), flips);
            }
            if pos.empty_count() == empties {
                return pos;
            }
        }
    }

    fn solver(params: &SearchParams) -> AlphaBetaSolver {
        AlphaBetaSolver::new(
            DiskSquareEvaluator::new(),
            Arc::new(TranspositionTable::new(4, 0.8)),
            Arc::new(NativeExactSolver::new()),
            params,
        )
    }

    #[test]
    fn test_solve_matches_exact_solver() {
        let native = NativeExactSolver::new();
        for seed in 0..4 {
            let pos = random_position(seed, 12);
            let expected = native.solve(&pos, -SCORE_INF, SCORE_INF).score;
            let mut s = solver(&SearchParams::default());
            assert_eq!(s.solve(&pos, -SCORE_INF, SCORE_INF), expected, "{pos}");
            assert!(s.nodes() > 0);
        }
    }

    #[test]
    fn test_solve_with_cost_ordering() {
        let params = SearchParams {
            endgame_ordering_empties: 0,
            exact_solver_empties: 4,
            ..SearchParams::default()
        };
        let native = NativeExactSolver::new();
        for seed in 10..13 {
            let pos = random_position(seed, 11);
            let expected = native.solve(&pos, -SCORE_INF, SCORE_INF).score;
            assert_eq!(solver(&params).solve(&pos, -SCORE_INF, SCORE_INF), expected);
        }
    }

    #[test]
    fn test_solve_fail_soft_window() {
        let pos = random_position(42, 12);
        let exact = solver(&SearchParams::default()).solve(&pos, -SCORE_INF, SCORE_INF);

        // fail low
        let v = solver(&SearchParams::default()).solve(&pos, exact + 100, exact + 300);
        assert!(v <= exact + 100 && v >= exact, "{v} vs {exact}");
        // fail high
        let v = solver(&SearchParams::default()).solve(&pos, exact - 300, exact - 100);
        assert!(v >= exact - 100 && v <= exact, "{v} vs {exact}");
        // 窓の内側
        let v = solver(&SearchParams::default()).solve(&pos, exact - 100, exact + 100);
        assert_eq!(v, exact);
    }

    #[test]
    fn test_depth_zero_is_static_eval() {
        let pos = random_position(7, 40);
        let mut ev = DiskSquareEvaluator::new();
        ev.setup(&pos);
        assert_eq!(solver(&SearchParams::default()).probe(&pos, 0), ev.eval());
    }

    #[test]
    fn test_pass_does_not_consume_depth() {
        // b1 に手番側、a1 に相手側: 手番側は打てず、相手側は c1 に打てる
        let pos = Position::new(1 << 1, 1 << 0);
        assert_eq!(pos.legal_moves(), 0);
        assert_ne!(pos.opponent_moves(), 0);
        let mut s = solver(&SearchParams::default());
        let passed = s.probe(&pos.pass(), 1);
        assert_eq!(s.probe(&pos, 1), -passed);
    }

    #[test]
    fn test_tt_populated() {
        let pos = random_position(3, 30);
        let mut s = solver(&SearchParams::default());
        let v = s.probe(&pos, 4);
        assert!(!s.tt().is_empty());
        // 2回目は置換表だけで決まる
        s.reset_nodes();
        assert_eq!(s.probe(&pos, 4), v);
        assert_eq!(s.nodes(), 1);
        assert!((MIN_SCORE..=MAX_SCORE).contains(&v));
    }

    #[test]
    fn test_shallow_probe_reuses_deeper_entry() {
        let pos = random_position(5, 30);
        let mut s = solver(&SearchParams::default());
        let deep = s.probe(&pos, 4);
        s.reset_nodes();
        assert_eq!(s.probe(&pos, 1), deep);
        assert_eq!(s.nodes(), 1);

        // 新しい置換表なら深さ 1 の値そのもの
        let mut fresh = solver(&SearchParams::default());
        let shallow = fresh.probe(&pos, 1);
        assert!(fresh.nodes() > 1);
        assert!((MIN_SCORE..=MAX_SCORE).contains(&shallow));
    }
}
