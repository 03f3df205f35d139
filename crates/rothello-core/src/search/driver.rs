//! マルチスレッド探索ドライバ
//!
//! ワーカーは共有の局面グラフから最良の葉を選び、次のどれかで処理して結果を書き戻す。
//! - 小さく「解く価値のある」葉はターゲット周りの狭い窓で完全読みする
//! - グラフに空きがあれば1手展開し、子を浅い探索で初期化する
//! - 空きがなければ深さを上げて再評価する
//!
//! 停止は協調的: 状態が `Running` 以外になったら、ワーカーは次の選択の前に抜ける。

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use super::alpha_beta::AlphaBetaSolver;
use super::error::SearchError;
use super::error_model::depth_multiplier;
use super::evaluation::Evaluation;
use super::graph::{ChildSeed, LeafOutcome, PositionGraph, Seed};
use super::params::SearchParams;
use super::selection::LeafPath;
use crate::board::{Position, squares};
use crate::endgame::{ExactSolver, NativeExactSolver};
use crate::eval::{DiskSquareEvaluator, Evaluator};
use crate::tt::TranspositionTable;
use crate::types::{
    MAX_TARGET, MIN_TARGET, Move, SCORE_INF, Score, TARGET_STEP, target_at_or_above,
    target_at_or_below,
};

/// ドライバの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum DriverState {
    /// まだ探索していない
    None = 0,
    Running = 1,
    /// 時間切れ
    StoppedTime = 2,
    /// 訪問ノード数の上限
    StoppedPositions = 3,
    /// 窓内のターゲットがすべて解決した
    Solved = 4,
    /// 停止要求を受け、ワーカーの終了待ち
    Killing = 5,
    Killed = 6,
    /// ワーカーの異常終了、または整合性チェックの失敗。結果は信用できない
    Failed = 7,
}

impl DriverState {
    fn from_u8(value: u8) -> DriverState {
        match value {
            1 => DriverState::Running,
            2 => DriverState::StoppedTime,
            3 => DriverState::StoppedPositions,
            4 => DriverState::Solved,
            5 => DriverState::Killing,
            6 => DriverState::Killed,
            7 => DriverState::Failed,
            _ => DriverState::None,
        }
    }

    /// 探索が終わった状態か
    pub fn is_finished(self) -> bool {
        !matches!(self, DriverState::None | DriverState::Running | DriverState::Killing)
    }
}

/// 状態と、ワーカーを起こすための条件変数
struct Control {
    state: AtomicU8,
    wake: Mutex<()>,
    cv: Condvar,
}

impl Control {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(DriverState::None as u8),
            wake: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    #[inline]
    fn state(&self) -> DriverState {
        DriverState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: DriverState) {
        self.state.store(state as u8, Ordering::Release);
        self.notify_all();
    }

    /// `from` のときだけ `to` へ遷移する
    fn transition(&self, from: DriverState, to: DriverState) -> bool {
        let changed = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if changed {
            self.notify_all();
        }
        changed
    }

    fn notify_all(&self) {
        let _guard = self.wake.lock();
        self.cv.notify_all();
    }

    fn wait(&self, timeout: Duration) {
        let mut guard = self.wake.lock();
        if self.state() == DriverState::Running {
            self.cv.wait_for(&mut guard, timeout);
        }
    }
}

/// 別スレッドから探索を止めるためのハンドル
#[derive(Clone)]
pub struct StopHandle {
    control: Arc<Control>,
}

impl StopHandle {
    /// 実行中の探索に停止を要求する。実行中でなければ何もしない。
    pub fn kill(&self) -> bool {
        self.control.transition(DriverState::Running, DriverState::Killing)
    }

    pub fn state(&self) -> DriverState {
        self.control.state()
    }
}

/// 探索結果の要約
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub state: DriverState,
    pub visited: u64,
    pub graph_nodes: usize,
    pub elapsed_ms: u64,
    /// ルートの証明済み下界・上界
    pub lower: Score,
    pub upper: Score,
    /// ルートの追跡範囲
    pub weak_lower: Score,
    pub weak_upper: Score,
    /// ルートの期待スコア
    pub estimate: Score,
    pub best_move: String,
    pub best_move_score: Option<Score>,
    pub descendants: u64,
    pub tt_fill: f64,
}

/// 探索ドライバ
pub struct SearchDriver<E: Evaluator + Clone = DiskSquareEvaluator> {
    params: SearchParams,
    graph: PositionGraph,
    tt: Arc<TranspositionTable>,
    exact: Arc<dyn ExactSolver>,
    evaluator: E,
    control: Arc<Control>,
    visited: AtomicU64,
    total_issued: AtomicU64,
    /// 窓の端のターゲット
    window: (Score, Score),
    /// 予算判定用に最後に記録した最善手
    last_best: Mutex<Move>,
    elapsed: Duration,
    failure: Option<SearchError>,
}

impl SearchDriver {
    pub fn new(params: SearchParams) -> Self {
        Self::with_components(params, DiskSquareEvaluator::new(), Arc::new(NativeExactSolver::new()))
    }
}

impl<E: Evaluator + Clone> SearchDriver<E> {
    /// 評価関数と完全読みソルバーを指定して作る
    pub fn with_components(params: SearchParams, evaluator: E, exact: Arc<dyn ExactSolver>) -> Self {
        let params = params.sanitized();
        let graph = PositionGraph::new(params.max_graph_nodes, params.combiner.build(), exact.clone());
        let tt = Arc::new(TranspositionTable::new(params.tt_size_mb, params.tt_fill_threshold));
        Self {
            params,
            graph,
            tt,
            exact,
            evaluator,
            control: Arc::new(Control::new()),
            visited: AtomicU64::new(0),
            total_issued: AtomicU64::new(0),
            window: (MIN_TARGET, MAX_TARGET),
            last_best: Mutex::new(Move::NONE),
            elapsed: Duration::ZERO,
            failure: None,
        }
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn graph(&self) -> &PositionGraph {
        &self.graph
    }

    pub fn state(&self) -> DriverState {
        self.control.state()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { control: self.control.clone() }
    }

    /// 最後の探索を `Failed` にした原因
    pub fn failure(&self) -> Option<&SearchError> {
        self.failure.as_ref()
    }

    /// 最後の探索での訪問ノード数
    pub fn visited(&self) -> u64 {
        self.visited.load(Ordering::Relaxed)
    }

    /// ルートを設定してから書き戻した葉の数
    pub fn total_issued(&self) -> u64 {
        self.total_issued.load(Ordering::Relaxed)
    }

    /// ルートの最善手と、その手の期待スコア
    pub fn best_move(&self) -> Option<(Move, Score)> {
        self.graph.best_move()
    }

    /// ルートの期待スコア
    pub fn root_estimate(&self) -> Option<Score> {
        self.graph.root().and_then(|root| self.graph.expected_score(root))
    }

    /// ルートの証明済み `(下界, 上界)`
    pub fn root_bounds(&self) -> Option<(Score, Score)> {
        self.graph.root().and_then(|root| self.graph.bounds(root))
    }

    /// `position` を窓 `[lower, upper]` で探索する
    ///
    /// ルートが前回と同じ局面ならグラフを引き継ぐ。
    /// 戻り値の状態が `Failed` のときは評価値を信用してはならない。
    pub fn evaluate_position(
        &mut self,
        position: Position,
        lower: Score,
        upper: Score,
        max_visited: u64,
        max_time: Duration,
    ) -> SearchReport {
        let start = Instant::now();
        self.window = window_targets(lower, upper);
        let (lo, hi) = self.window;

        let reuse = self.graph.root_position() == Some(position)
            && self.control.state() != DriverState::Failed;
        if reuse {
            self.graph.set_weak_bounds(lo, hi);
        } else {
            let mut solver = self.new_solver();
            let seed = seed_for(&self.params, &mut solver, &position);
            self.graph.reset(position, seed, lo, hi);
            self.total_issued.store(0, Ordering::Relaxed);
            debug!("new root {position}");
        }
        self.failure = None;
        self.visited.store(0, Ordering::Relaxed);
        *self.last_best.lock() = Move::NONE;
        self.control.set(DriverState::Running);
        info!(
            "search start: window {lo}..={hi}, max_visited {max_visited}, max_time {}ms, threads {}, reuse {reuse}",
            max_time.as_millis(),
            self.params.threads
        );

        let errors = self.run_workers(max_visited, max_time, start);
        if let Some(e) = errors.into_iter().next() {
            warn!("search failed: {e}");
            self.control.set(DriverState::Failed);
            self.failure = Some(e);
        }
        self.control.transition(DriverState::Killing, DriverState::Killed);

        if (cfg!(debug_assertions) || cfg!(feature = "invariant-checks"))
            && let Err(e) = self.verify()
        {
            error!("graph check failed: {e}");
            self.control.set(DriverState::Failed);
            // 最初の失敗理由を残す
            self.failure.get_or_insert(e);
        }

        self.elapsed = start.elapsed();
        let report = self.report();
        info!(
            "search stop: {:?}, visited {}, nodes {}, {}ms, bounds {}..={}, estimate {}, best {}",
            report.state,
            report.visited,
            report.graph_nodes,
            report.elapsed_ms,
            report.lower,
            report.upper,
            report.estimate,
            report.best_move
        );
        report
    }

    /// 現在の状態の要約
    pub fn report(&self) -> SearchReport {
        let (lower, upper) = self.root_bounds().unwrap_or((-SCORE_INF, SCORE_INF));
        let (weak_lower, weak_upper) = self
            .graph
            .root()
            .and_then(|root| self.graph.weak_bounds(root))
            .unwrap_or(self.window);
        let best = self.best_move();
        SearchReport {
            state: self.state(),
            visited: self.visited(),
            graph_nodes: self.graph.len(),
            elapsed_ms: u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX),
            lower,
            upper,
            weak_lower,
            weak_upper,
            estimate: self.root_estimate().unwrap_or(0),
            best_move: best.map_or_else(|| Move::NONE.to_string(), |(mv, _)| mv.to_string()),
            best_move_score: best.map(|(_, score)| score),
            descendants: self.graph.root().map_or(0, |root| self.graph.descendants(root)),
            tt_fill: self.tt.fill_ratio(),
        }
    }

    fn new_solver(&self) -> AlphaBetaSolver<E> {
        AlphaBetaSolver::new(self.evaluator.clone(), self.tt.clone(), self.exact.clone(), &self.params)
    }

    /// グラフの整合性と、ルートの訪問数の保存を確かめる
    fn verify(&self) -> Result<(), SearchError> {
        self.graph.check_invariants()?;
        let descendants = self.graph.root().map_or(0, |root| self.graph.descendants(root));
        let issued = self.total_issued();
        if descendants != issued {
            return Err(SearchError::invariant(format!(
                "root descendants {descendants} != issued {issued}"
            )));
        }
        Ok(())
    }

    fn run_workers(&self, max_visited: u64, max_time: Duration, start: Instant) -> Vec<SearchError> {
        let shared = Shared {
            graph: &self.graph,
            control: &self.control,
            params: &self.params,
            visited: &self.visited,
            total_issued: &self.total_issued,
            last_best: &self.last_best,
            window: self.window,
            max_visited,
            max_time,
            start,
        };
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.params.threads)
                .map(|id| {
                    let solver = self.new_solver();
                    let shared = &shared;
                    scope.spawn(move || Worker { id, solver, shared }.run_guarded())
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .filter_map(|(worker, handle)| match handle.join() {
                    Ok(result) => result.err(),
                    Err(_) => Some(SearchError::WorkerPanicked { worker }),
                })
                .collect()
        })
    }
}

/// ワーカー間で共有する参照
struct Shared<'a> {
    graph: &'a PositionGraph,
    control: &'a Control,
    params: &'a SearchParams,
    visited: &'a AtomicU64,
    total_issued: &'a AtomicU64,
    last_best: &'a Mutex<Move>,
    window: (Score, Score),
    max_visited: u64,
    max_time: Duration,
    start: Instant,
}

struct Worker<'a, E: Evaluator> {
    id: usize,
    solver: AlphaBetaSolver<E>,
    shared: &'a Shared<'a>,
}

impl<E: Evaluator> Worker<'_, E> {
    /// panic を `Failed` として回収し、他のワーカーを止める
    fn run_guarded(mut self) -> Result<(), SearchError> {
        let worker = self.id;
        let control = self.shared.control;
        match catch_unwind(AssertUnwindSafe(|| self.run())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                control.set(DriverState::Failed);
                Err(SearchError::WorkerFailed { worker, source: Box::new(e) })
            }
            Err(_) => {
                warn!("worker {worker} panicked");
                control.set(DriverState::Failed);
                Err(SearchError::WorkerPanicked { worker })
            }
        }
    }

    fn run(&mut self) -> Result<(), SearchError> {
        let s = self.shared;
        let (lo, hi) = s.window;
        let mut iteration = 0u64;
        debug!("worker {} start", self.id);
        while s.control.state() == DriverState::Running {
            if let Some(stop) = self.budget_exhausted() {
                s.control.transition(DriverState::Running, stop);
                break;
            }
            if self.id == 0 && iteration % s.params.weak_bounds_interval == 0 {
                self.update_weak_bounds();
                *s.last_best.lock() = s.graph.best_move().map_or(Move::NONE, |(mv, _)| mv);
            }
            iteration += 1;

            match s.graph.select(lo, hi) {
                Some(path) => {
                    let before = self.solver.nodes();
                    let outcome = self.resolve(&path);
                    let spent = self.solver.nodes() - before;
                    s.visited.fetch_add(spent + 1, Ordering::Relaxed);
                    s.graph.apply(path, outcome)?;
                    s.total_issued.fetch_add(1, Ordering::Relaxed);
                    s.control.notify_all();
                }
                None => {
                    if self.root_solved() {
                        s.control.transition(DriverState::Running, DriverState::Solved);
                    } else if !self.widen_for_unsolved() {
                        s.control.wait(Duration::from_micros(s.params.wait_micros));
                    }
                }
            }
        }
        debug!("worker {} exit after {iteration} iterations", self.id);
        Ok(())
    }

    /// 予算を使い切っていれば停止後の状態
    ///
    /// 予算を超えても、最善手が最後の記録から変わっていれば
    /// `budget_hysteresis` 倍まで続ける。
    fn budget_exhausted(&self) -> Option<DriverState> {
        let s = self.shared;
        let visited = s.visited.load(Ordering::Relaxed);
        let elapsed = s.start.elapsed();
        let budget = Budget {
            max_visited: s.max_visited,
            max_time: s.max_time,
            hysteresis: s.params.budget_hysteresis,
        };
        budget.stop_reason(visited, elapsed, || {
            let best = s.graph.best_move().map_or(Move::NONE, |(mv, _)| mv);
            best == *s.last_best.lock()
        })
    }

    /// 葉の処理
    fn resolve(&mut self, path: &LeafPath) -> LeafOutcome {
        let p = self.shared.params;
        let pos = path.position();
        if pos.is_game_over() {
            return LeafOutcome::Solved(pos.final_score());
        }
        let empties = pos.empty_count();
        let worth_solving = empties <= p.always_solve_empties
            || path.proof_number().min(path.disproof_number()) < p.solve_proof_threshold;
        if empties <= p.max_solve_empties && worth_solving {
            let target = path.target();
            let (alpha, beta) = (target - 100, target + 100);
            let value = self.solver.solve(&pos, alpha, beta);
            return LeafOutcome::Bounded { alpha, beta, value };
        }

        let moves = pos.legal_moves();
        if self.shared.graph.has_room(moves.count_ones().max(1) as usize) {
            let seeds = if moves == 0 {
                let child = pos.pass();
                vec![ChildSeed { mv: Move::PASS, position: child, seed: seed_for(p, &mut self.solver, &child) }]
            } else {
                squares(moves)
                    .map(|square| {
                        let child = pos.play_with_flips(square, pos.flips(square));
                        let seed = seed_for(p, &mut self.solver, &child);
                        ChildSeed { mv: Move::from_square(square), position: child, seed }
                    })
                    .collect()
            };
            return LeafOutcome::Expanded(seeds);
        }
        self.deepen(path)
    }

    /// 訪問回数に比例したノード数を使うまで深さを上げて再評価する
    fn deepen(&mut self, path: &LeafPath) -> LeafOutcome {
        let p = self.shared.params;
        let pos = path.position();
        let empties = pos.empty_count();
        let budget = p.deepen_multiplier * (path.leaf_descendants() + 1) as f64 * p.deepen_base_nodes as f64;
        let start = self.solver.nodes();
        let mut depth = p.probe_depth + 1;
        loop {
            if depth >= empties {
                return LeafOutcome::Solved(self.solver.solve(&pos, -SCORE_INF, SCORE_INF));
            }
            let estimate = self.solver.probe(&pos, depth);
            if (self.solver.nodes() - start) as f64 >= budget {
                return LeafOutcome::Reestimated {
                    estimate,
                    multiplier: p.error_multiplier * depth_multiplier(depth),
                };
            }
            depth += 1;
        }
    }

    /// 窓内のターゲットがすべて解決したか
    fn root_solved(&self) -> bool {
        let (lo, hi) = self.shared.window;
        self.shared
            .graph
            .root_evaluations()
            .iter()
            .filter(|(t, _)| (lo..=hi).contains(t))
            .all(|(_, e)| e.is_solved())
    }

    /// 追跡範囲を確率に合わせて詰める
    fn update_weak_bounds(&self) {
        let s = self.shared;
        let Some(current) = s.graph.root().and_then(|root| s.graph.weak_bounds(root)) else {
            return;
        };
        let evals = s.graph.root_evaluations();
        let next = next_weak_bounds(&evals, s.window, s.params.weak_bound_high, s.params.weak_bound_low);
        if let Some((lo, hi)) = next
            && (lo, hi) != current
        {
            debug!("weak bounds {}..={} -> {lo}..={hi}", current.0, current.1);
            s.graph.set_weak_bounds(lo, hi);
        }
    }

    /// 追跡範囲内が解決済みで、範囲外に未解決のターゲットがあれば1段広げる
    fn widen_for_unsolved(&self) -> bool {
        let s = self.shared;
        let (lo, hi) = s.window;
        let Some((wl, wu)) = s.graph.root().and_then(|root| s.graph.weak_bounds(root)) else {
            return false;
        };
        let evals = s.graph.root_evaluations();
        let unsolved = |t: &Score| {
            (lo..=hi).contains(t) && evals.iter().any(|(target, e)| target == t && !e.is_solved())
        };
        let targets = || evals.iter().map(|(t, _)| *t);
        if targets().filter(|t| (wl..=wu).contains(t)).any(|t| unsolved(&t)) {
            return false;
        }
        let below = targets().filter(|t| *t < wl).any(|t| unsolved(&t));
        let above = targets().filter(|t| *t > wu).any(|t| unsolved(&t));
        if !below && !above {
            return false;
        }
        let new_lo = if below { (wl - TARGET_STEP).max(lo) } else { wl };
        let new_hi = if above { (wu + TARGET_STEP).min(hi) } else { wu };
        debug!("widen weak bounds {wl}..={wu} -> {new_lo}..={new_hi}");
        s.graph.set_weak_bounds(new_lo, new_hi);
        true
    }
}

/// 窓 `[lower, upper]` の両端のターゲット
/// 訪問数と時間の予算
#[derive(Clone, Copy, Debug)]
struct Budget {
    max_visited: u64,
    max_time: Duration,
    hysteresis: f64,
}

impl Budget {
    /// 止めるべきなら停止理由を返す
    ///
    /// 予算を超えた後は `best_unchanged` が真のときだけ止まる。
    /// `hysteresis` 倍に達したら最善手によらず止まる。時間切れを優先する。
    fn stop_reason(
        &self,
        visited: u64,
        elapsed: Duration,
        best_unchanged: impl FnOnce() -> bool,
    ) -> Option<DriverState> {
        let stop = if elapsed >= self.max_time {
            DriverState::StoppedTime
        } else if visited >= self.max_visited {
            DriverState::StoppedPositions
        } else {
            return None;
        };
        let hard_visited = (self.max_visited as f64 * self.hysteresis) as u64;
        let hard_time = self.max_time.as_secs_f64() * self.hysteresis;
        if visited >= hard_visited || elapsed.as_secs_f64() >= hard_time || best_unchanged() {
            Some(stop)
        } else {
            None
        }
    }
}

fn window_targets(lower: Score, upper: Score) -> (Score, Score) {
    let lo = target_at_or_above(lower.clamp(MIN_TARGET, MAX_TARGET));
    let hi = target_at_or_below(upper.clamp(MIN_TARGET, MAX_TARGET));
    if lo > hi { (hi, lo) } else { (lo, hi) }
}

/// 新しい葉の初期値（浅い探索）
fn seed_for<E: Evaluator>(params: &SearchParams, solver: &mut AlphaBetaSolver<E>, pos: &Position) -> Seed {
    if pos.is_game_over() {
        return Seed::Exact(pos.final_score());
    }
    let empties = pos.empty_count();
    let depth = params.probe_depth.min(empties);
    let score = solver.probe(pos, depth);
    if depth >= empties {
        Seed::Exact(score)
    } else {
        Seed::Estimate { score, multiplier: params.error_multiplier * depth_multiplier(depth) }
    }
}

/// ルートの評価から次の追跡範囲を求める
///
/// 下端はほぼ確実に超える最大のターゲット、上端はほぼ確実に超えない最小のターゲット。
/// 窓内に未解決のターゲットがなければ `None`。
pub(crate) fn next_weak_bounds(
    evals: &[(Score, Evaluation)],
    window: (Score, Score),
    high: f64,
    low: f64,
) -> Option<(Score, Score)> {
    let (lo, hi) = window;
    let unsolved: Vec<(Score, f64)> = evals
        .iter()
        .filter(|(t, e)| (lo..=hi).contains(t) && !e.is_solved())
        .map(|(t, e)| (*t, e.probability()))
        .collect();
    let min = unsolved.iter().map(|&(t, _)| t).min()?;
    let max = unsolved.iter().map(|&(t, _)| t).max()?;
    let lower = unsolved.iter().filter(|&&(_, p)| p >= high).map(|&(t, _)| t).max().unwrap_or(min);
    let upper = unsolved.iter().filter(|&&(_, p)| p <= low).map(|&(t, _)| t).min().unwrap_or(max);
    if lower > upper { Some((min, max)) } else { Some((lower, upper)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MAX_SCORE, MIN_SCORE, targets_between};

    fn ladder(probs: impl Fn(Score) -> f64) -> Vec<(Score, Evaluation)> {
        targets_between(MIN_TARGET, MAX_TARGET)
            .map(|t| (t, Evaluation::leaf(probs(t), 10.0, 10.0)))
            .collect()
    }

    const BUDGET: Budget =
        Budget { max_visited: 1000, max_time: Duration::from_secs(10), hysteresis: 2.0 };

    #[test]
    fn test_budget_under_limits_never_stops() {
        let stop = BUDGET.stop_reason(999, Duration::from_secs(9), || panic!("best move not needed"));
        assert_eq!(stop, None);
    }

    #[test]
    fn test_budget_soft_stop_waits_for_stable_best_move() {
        let second = Duration::from_secs(1);
        assert_eq!(BUDGET.stop_reason(1000, second, || false), None);
        assert_eq!(BUDGET.stop_reason(1999, second, || false), None);
        assert_eq!(BUDGET.stop_reason(1000, second, || true), Some(DriverState::StoppedPositions));
        assert_eq!(BUDGET.stop_reason(1, Duration::from_secs(15), || false), None);
        assert_eq!(BUDGET.stop_reason(1, Duration::from_secs(10), || true), Some(DriverState::StoppedTime));
    }

    #[test]
    fn test_budget_hard_limit_ignores_best_move() {
        let second = Duration::from_secs(1);
        assert_eq!(BUDGET.stop_reason(2000, second, || false), Some(DriverState::StoppedPositions));
        assert_eq!(
            BUDGET.stop_reason(1, Duration::from_secs(20), || false),
            Some(DriverState::StoppedTime)
        );
        // 両方超えたら時間切れ
        assert_eq!(
            BUDGET.stop_reason(5000, Duration::from_secs(20), || false),
            Some(DriverState::StoppedTime)
        );
    }

    #[test]
    fn test_budget_without_hysteresis_stops_at_limit() {
        let budget = Budget { hysteresis: 1.0, ..BUDGET };
        assert_eq!(
            budget.stop_reason(1000, Duration::ZERO, || false),
            Some(DriverState::StoppedPositions)
        );
    }

    #[test]
    fn test_window_targets() {
        assert_eq!(window_targets(MIN_SCORE, MAX_SCORE), (MIN_TARGET, MAX_TARGET));
        assert_eq!(window_targets(0, 0), (-100, 100));
        assert_eq!(window_targets(-300, 500), (-300, 500));
        assert_eq!(window_targets(-200, 400), (-100, 300));
    }

    #[test]
    fn test_next_weak_bounds_narrows() {
        // スコア 0 付近を中心とした確率
        let evals = ladder(|t| match t {
            t if t <= -900 => 0.99,
            t if t >= 900 => 0.01,
            _ => 0.5,
        });
        let bounds = next_weak_bounds(&evals, (MIN_TARGET, MAX_TARGET), 0.98, 0.02);
        assert_eq!(bounds, Some((-900, 900)));
    }

    #[test]
    fn test_next_weak_bounds_keeps_full_range_without_confidence() {
        let evals = ladder(|_| 0.5);
        let bounds = next_weak_bounds(&evals, (-1100, 1100), 0.98, 0.02);
        assert_eq!(bounds, Some((-1100, 1100)));
    }

    #[test]
    fn test_next_weak_bounds_ignores_solved() {
        let mut evals = ladder(|_| 0.5);
        for (t, e) in &mut evals {
            if *t != 300 {
                *e = if *t < 300 { Evaluation::proved() } else { Evaluation::disproved() };
            }
        }
        assert_eq!(next_weak_bounds(&evals, (MIN_TARGET, MAX_TARGET), 0.98, 0.02), Some((300, 300)));

        let solved: Vec<_> = evals.iter().map(|(t, _)| (*t, Evaluation::proved())).collect();
        assert_eq!(next_weak_bounds(&solved, (MIN_TARGET, MAX_TARGET), 0.98, 0.02), None);
    }

    #[test]
    fn test_driver_state_roundtrip() {
        for state in [
            DriverState::None,
            DriverState::Running,
            DriverState::StoppedTime,
            DriverState::StoppedPositions,
            DriverState::Solved,
            DriverState::Killing,
            DriverState::Killed,
            DriverState::Failed,
        ] {
            assert_eq!(DriverState::from_u8(state as u8), state);
        }
        assert!(DriverState::Solved.is_finished());
        assert!(!DriverState::Killing.is_finished());
        assert_eq!(serde_json::to_string(&DriverState::StoppedTime).unwrap(), "\"STOPPED_TIME\"");
    }

    fn small_params() -> SearchParams {
        SearchParams {
            threads: 1,
            tt_size_mb: 4,
            budget_hysteresis: 1.0,
            ..SearchParams::default()
        }
    }

    #[test]
    fn test_game_over_solved_immediately() {
        let mut driver = SearchDriver::new(small_params());
        let pos = Position::new(0b11, 1 << 63);
        let report = driver.evaluate_position(pos, MIN_SCORE, MAX_SCORE, 1_000, Duration::from_secs(10));
        assert_eq!(report.state, DriverState::Solved);
        assert_eq!((report.lower, report.upper), (6200, 6200));
        assert_eq!(report.graph_nodes, 1);
        assert_eq!(driver.total_issued(), 0);
    }

    #[test]
    fn test_budget_one_expands_root_once() {
        let mut driver = SearchDriver::new(small_params());
        let report =
            driver.evaluate_position(Position::initial(), MIN_SCORE, MAX_SCORE, 1, Duration::from_secs(60));
        assert_eq!(report.state, DriverState::StoppedPositions);
        assert_eq!(report.graph_nodes, 5);
        assert_eq!(driver.total_issued(), 1);
        assert!(driver.failure().is_none());
        assert!(report.best_move_score.is_some());
    }

    #[test]
    fn test_kill_before_start_is_noop() {
        let driver = SearchDriver::new(small_params());
        assert!(!driver.stop_handle().kill());
        assert_eq!(driver.state(), DriverState::None);
    }
}
