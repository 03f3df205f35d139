//! 局面グラフ
//!
//! 同一局面を1つのノードにまとめた DAG。ノードはアリーナ（`Vec`）に置き、
//! 親子関係はノード番号のリストで持つ。
//!
//! ロックの規律:
//! - 構造（ノードの追加、親子リスト、評価の再計算）の変更はグローバルな書き込みロックの下でのみ行う
//! - 葉の選択は読み込みロックの下で行い、ノードごとの Mutex で所有マーカーだけを書き換える
//! - 読み込みロック中は同時に2つ以上のノードをロックしない

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hasher};
use std::sync::Arc;

use log::debug;
use parking_lot::{MutexGuard, RwLock};
use smallvec::SmallVec;

use super::combiner::ScoreCombiner;
use super::error::SearchError;
use super::error_model::{expected_error, probability_above};
use super::evaluation::Evaluation;
use super::node::{ChildLink, NodeId, NodeState, PositionNode};
use super::selection::LeafPath;
use crate::board::Position;
use crate::endgame::ExactSolver;
use crate::types::{MAX_TARGET, MIN_TARGET, Move, Score, targets_between};

/// 2枚のビットボードの乗算ハッシュ
#[derive(Default, Clone, Copy)]
pub(crate) struct PositionHasher(u64);

impl Hasher for PositionHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_u64(u64::from(b));
        }
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        self.0 = (self.0.rotate_left(23) ^ value).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0 ^ (self.0 >> 31)
    }
}

type BuildPositionHasher = BuildHasherDefault<PositionHasher>;

/// 子局面の初期値
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Seed {
    /// 浅い探索値と誤差倍率
    Estimate { score: Score, multiplier: f64 },
    /// 確定値（終局、または完全読み）
    Exact(Score),
}

/// 展開で作る子1つ分
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSeed {
    pub mv: Move,
    pub position: Position,
    pub seed: Seed,
}

/// 葉の処理結果
#[derive(Debug, Clone, PartialEq)]
pub enum LeafOutcome {
    /// 1手展開した（合法手がなければパスの子1つ）
    Expanded(Vec<ChildSeed>),
    /// 窓 `(alpha, beta)` での fail-soft 完全読みの結果
    Bounded { alpha: Score, beta: Score, value: Score },
    /// 確定値
    Solved(Score),
    /// 深読みによる再評価
    Reestimated { estimate: Score, multiplier: f64 },
}

pub(crate) struct GraphInner {
    pub nodes: Vec<PositionNode>,
    pub index: HashMap<Position, NodeId, BuildPositionHasher>,
}

/// 局面グラフ
pub struct PositionGraph {
    inner: RwLock<GraphInner>,
    combiner: Box<dyn ScoreCombiner>,
    exact: Arc<dyn ExactSolver>,
    capacity: usize,
}

/// ルート
const ROOT: NodeId = 0;

impl PositionGraph {
    pub fn new(
        capacity: usize,
        combiner: Box<dyn ScoreCombiner>,
        exact: Arc<dyn ExactSolver>,
    ) -> Self {
        Self {
            inner: RwLock::new(GraphInner {
                nodes: Vec::new(),
                index: HashMap::default(),
            }),
            combiner,
            exact,
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn inner(&self) -> &RwLock<GraphInner> {
        &self.inner
    }

    #[inline]
    pub fn combiner(&self) -> &dyn ScoreCombiner {
        self.combiner.as_ref()
    }

    /// ノード数
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// あと `extra` 個のノードを追加できるか
    pub fn has_room(&self, extra: usize) -> bool {
        self.len() + extra <= self.capacity
    }

    /// 全ノードを削除
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.nodes.clear();
        inner.index.clear();
    }

    /// `root` だけからなるグラフにする
    pub fn reset(&self, root: Position, seed: Seed, weak_lower: Score, weak_upper: Score) {
        let mut inner = self.inner.write();
        inner.nodes.clear();
        inner.index.clear();
        let mut node = PositionNode::new(root, 0, weak_lower, weak_upper);
        self.seed_leaf(&mut node, seed);
        inner.nodes.push(node);
        inner.index.insert(root, ROOT);
        debug!("graph reset to {root} (weak bounds {weak_lower}..={weak_upper})");
    }

    pub fn root(&self) -> Option<NodeId> {
        (!self.is_empty()).then_some(ROOT)
    }

    pub fn root_position(&self) -> Option<Position> {
        self.inner.read().nodes.first().map(PositionNode::position)
    }

    pub fn get(&self, position: &Position) -> Option<NodeId> {
        self.inner.read().index.get(position).copied()
    }

    /// 局面のノードを返す。なければ親のない葉として作成する。
    pub fn get_or_create(&self, position: Position, depth: u32) -> NodeId {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let next = inner.nodes.len();
        match inner.index.entry(position) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                e.insert(next);
                let mut node = PositionNode::new(position, depth, MIN_TARGET, MAX_TARGET);
                let seed = if position.is_game_over() {
                    Seed::Exact(position.final_score())
                } else {
                    Seed::Estimate { score: 0, multiplier: 1.0 }
                };
                self.seed_leaf(&mut node, seed);
                inner.nodes.push(node);
                next
            }
        }
    }

    fn with_state<R>(&self, id: NodeId, f: impl FnOnce(&PositionNode, &NodeState) -> R) -> Option<R> {
        let inner = self.inner.read();
        let node = inner.nodes.get(id)?;
        let state = node.state.lock();
        Some(f(node, &state))
    }

    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.with_state(id, |n, _| n.position())
    }

    pub fn depth(&self, id: NodeId) -> Option<u32> {
        self.with_state(id, |n, _| n.depth())
    }

    pub fn children(&self, id: NodeId) -> Option<Vec<ChildLink>> {
        self.with_state(id, |_, s| s.children.clone()).flatten()
    }

    pub fn fathers(&self, id: NodeId) -> Vec<NodeId> {
        self.with_state(id, |_, s| s.fathers.clone()).unwrap_or_default()
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.with_state(id, |_, s| s.is_leaf()).unwrap_or(false)
    }

    /// ターゲット `target` の保存済み評価
    pub fn evaluation(&self, id: NodeId, target: Score) -> Option<Evaluation> {
        self.with_state(id, |_, s| s.evaluation(target).copied()).flatten()
    }

    /// 証明済みの `(下界, 上界)`
    pub fn bounds(&self, id: NodeId) -> Option<(Score, Score)> {
        self.with_state(id, |_, s| (s.lower, s.upper))
    }

    /// 追跡中のターゲット範囲
    pub fn weak_bounds(&self, id: NodeId) -> Option<(Score, Score)> {
        self.with_state(id, |_, s| (s.weak_lower, s.weak_upper))
    }

    pub fn descendants(&self, id: NodeId) -> u64 {
        self.with_state(id, |_, s| s.descendants).unwrap_or(0)
    }

    pub fn threads_working(&self, id: NodeId) -> u32 {
        self.with_state(id, |_, s| s.threads_working).unwrap_or(0)
    }

    /// 評価から求めたスコアの期待値
    pub fn expected_score(&self, id: NodeId) -> Option<Score> {
        self.with_state(id, |_, s| s.expected_score())
    }

    /// ルートの全ターゲットの評価（範囲外は境界・事実上の値で補う）
    pub fn root_evaluations(&self) -> Vec<(Score, Evaluation)> {
        self.with_state(ROOT, |_, s| {
            targets_between(MIN_TARGET, MAX_TARGET)
                .map(|t| (t, s.evaluation_or_bound(t)))
                .collect()
        })
        .unwrap_or_default()
    }

    /// ルートの最善手と、その手の期待スコア（ルートの手番側から見た値）
    pub fn best_move(&self) -> Option<(Move, Score)> {
        let inner = self.inner.read();
        let root = inner.nodes.first()?;
        let children = root.state.lock().children.clone()?;
        children
            .iter()
            .map(|link| {
                let child = inner.nodes[link.node].state.lock().expected_score();
                (link.mv, -child)
            })
            .max_by_key(|&(_, score)| score)
    }

    /// 子から親の評価を再計算する（葉なら何もしない）
    ///
    /// 子が変わっていなければ何度呼んでも同じ結果になる。
    pub fn update_father(&self, id: NodeId) -> bool {
        let inner = self.inner.write();
        if id >= inner.nodes.len() || inner.nodes[id].state.lock().is_leaf() {
            return false;
        }
        self.recompute_internal(&inner, id);
        true
    }

    /// ルートの追跡範囲を変え、全ノードの範囲と評価を作り直す
    pub fn set_weak_bounds(&self, weak_lower: Score, weak_upper: Score) {
        let inner = self.inner.write();
        if inner.nodes.is_empty() {
            return;
        }
        self.rebuild_ranges(&inner, weak_lower, weak_upper);
    }

    /// 葉の処理結果を反映し、祖先を再計算して経路の所有マーカーを解放する
    pub fn apply(&self, path: LeafPath, outcome: LeafOutcome) -> Result<(), SearchError> {
        let mut inner = self.inner.write();
        let leaf = path.leaf();
        let applied = self.apply_outcome(&mut inner, leaf, outcome);
        if applied.is_ok() {
            self.recompute_ancestors(&inner, leaf);
        }
        let released = Self::finish_path(&inner, &path, true);
        applied.and(released)
    }

    /// 処理せずに経路の所有マーカーを解放する
    pub fn release(&self, path: LeafPath) -> Result<(), SearchError> {
        let inner = self.inner.read();
        Self::finish_path(&inner, &path, false)
    }

    fn finish_path(inner: &GraphInner, path: &LeafPath, count: bool) -> Result<(), SearchError> {
        let mut result = Ok(());
        for step in path.steps() {
            let Some(node) = inner.nodes.get(step.node) else {
                result = Err(SearchError::invariant(format!("path node {} missing", step.node)));
                continue;
            };
            let mut state = node.state.lock();
            if count {
                state.descendants += 1;
                if let Some(e) = state.evaluation_mut(step.target) {
                    e.add_descendants(1);
                }
            }
            if state.threads_working == 0 {
                result = Err(SearchError::invariant(format!(
                    "threads_working underflow at node {}",
                    step.node
                )));
            } else {
                state.threads_working -= 1;
            }
        }
        result
    }

    fn apply_outcome(
        &self,
        inner: &mut GraphInner,
        leaf: NodeId,
        outcome: LeafOutcome,
    ) -> Result<(), SearchError> {
        if leaf >= inner.nodes.len() {
            return Err(SearchError::invariant(format!("leaf {leaf} missing")));
        }
        match outcome {
            LeafOutcome::Expanded(seeds) => self.expand(inner, leaf, seeds),
            other => self.update_leaf(inner, leaf, other),
        }
    }

    fn update_leaf(
        &self,
        inner: &GraphInner,
        leaf: NodeId,
        outcome: LeafOutcome,
    ) -> Result<(), SearchError> {
        let node = &inner.nodes[leaf];
        let mut state = node.state.lock();
        if !state.is_leaf() {
            return Err(SearchError::invariant(format!("node {leaf} is not a leaf")));
        }
        match outcome {
            LeafOutcome::Bounded { alpha, beta, value } => {
                if value <= alpha {
                    state.upper = state.upper.min(value);
                } else if value >= beta {
                    state.lower = state.lower.max(value);
                } else {
                    state.lower = value;
                    state.upper = value;
                }
                if state.lower > state.upper {
                    return Err(SearchError::invariant(format!(
                        "node {leaf} bounds crossed: {} > {}",
                        state.lower, state.upper
                    )));
                }
            }
            LeafOutcome::Solved(score) => {
                state.lower = score;
                state.upper = score;
                state.leaf_estimate = score;
            }
            LeafOutcome::Reestimated { estimate, multiplier } => {
                state.leaf_estimate = estimate;
                state.stddev_multiplier = multiplier;
            }
            LeafOutcome::Expanded(_) => {
                return Err(SearchError::invariant(format!("node {leaf}: expansion applied as update")));
            }
        }
        self.refresh_leaf(node.position(), node.empties(), &mut state);
        Ok(())
    }

    fn expand(
        &self,
        inner: &mut GraphInner,
        leaf: NodeId,
        seeds: Vec<ChildSeed>,
    ) -> Result<(), SearchError> {
        let (depth, lo, hi) = {
            let node = &inner.nodes[leaf];
            let state = node.state.lock();
            if !state.is_leaf() {
                return Err(SearchError::invariant(format!("node {leaf} expanded twice")));
            }
            (node.depth(), state.weak_lower, state.weak_upper)
        };
        if seeds.is_empty() {
            return Err(SearchError::invariant(format!("node {leaf} expanded without children")));
        }

        let mut links = Vec::with_capacity(seeds.len());
        let mut widened = false;
        for seed in seeds {
            let existing = inner.index.get(&seed.position).copied();
            let id = match existing {
                Some(id) => {
                    let mut state = inner.nodes[id].state.lock();
                    state.fathers.push(leaf);
                    widened |= state.weak_lower > -hi || state.weak_upper < -lo;
                    id
                }
                None => {
                    let id = inner.nodes.len();
                    let mut node = PositionNode::new(seed.position, depth + 1, -hi, -lo);
                    node.state.get_mut().fathers.push(leaf);
                    self.seed_leaf(&mut node, seed.seed);
                    inner.nodes.push(node);
                    inner.index.insert(seed.position, id);
                    id
                }
            };
            links.push(ChildLink { mv: seed.mv, node: id });
        }
        inner.nodes[leaf].state.lock().children = Some(links);

        if widened {
            let (root_lo, root_hi) = {
                let root = inner.nodes[ROOT].state.lock();
                (root.weak_lower, root.weak_upper)
            };
            self.rebuild_ranges(inner, root_lo, root_hi);
        } else {
            self.recompute_internal(inner, leaf);
        }
        Ok(())
    }

    fn seed_leaf(&self, node: &mut PositionNode, seed: Seed) {
        let (position, empties) = (node.position(), node.empties());
        let state = node.state.get_mut();
        match seed {
            Seed::Estimate { score, multiplier } => {
                state.leaf_estimate = score;
                state.stddev_multiplier = multiplier;
            }
            Seed::Exact(score) => {
                state.leaf_estimate = score;
                state.lower = score;
                state.upper = score;
            }
        }
        self.refresh_leaf(position, empties, state);
    }

    /// 葉の評価を探索値と誤差モデルから作り直す
    fn refresh_leaf(&self, position: Position, empties: u32, state: &mut NodeState) {
        let sigma = expected_error(empties) * state.stddev_multiplier;
        let (lower, upper, estimate) = (state.lower, state.upper, state.leaf_estimate);
        for t in targets_between(state.weak_lower, state.weak_upper) {
            let e = state.get_or_add(t);
            if t < lower {
                e.set_proved();
            } else if t > upper {
                e.set_disproved();
            } else {
                e.set_leaf(
                    probability_above(t, estimate, sigma),
                    self.exact.proof_number(&position, t, estimate),
                    self.exact.disproof_number(&position, t, estimate),
                );
            }
        }
    }

    /// 子の評価から内部ノードの境界と評価を作り直す（書き込みロック中のみ）
    fn recompute_internal(&self, inner: &GraphInner, id: NodeId) {
        let node = &inner.nodes[id];
        let mut state = node.state.lock();
        let Some(children) = state.children.clone() else {
            return;
        };
        let guards: SmallVec<[MutexGuard<'_, NodeState>; 16]> =
            children.iter().map(|link| inner.nodes[link.node].state.lock()).collect();

        // 葉のときに完全読みで得た境界は子から求めた境界と交わりを取って残す
        if let Some(lower) = guards.iter().map(|c| -c.upper).max() {
            state.lower = state.lower.max(lower);
        }
        if let Some(upper) = guards.iter().map(|c| -c.lower).max() {
            state.upper = state.upper.min(upper);
        }

        let (lower, upper) = (state.lower, state.upper);
        for t in targets_between(state.weak_lower, state.weak_upper) {
            let e = state.get_or_add(t);
            if t < lower {
                e.set_proved();
            } else if t > upper {
                e.set_disproved();
            } else {
                let (prob, proof, disproof, priority) = self.combine(t, &guards);
                e.set_internal(prob, proof, disproof, priority);
            }
        }
    }

    /// ターゲット `t` について子の評価を合成する
    ///
    /// 戻り値は `(確率, 証明数, 反証数, 探索優先度)`。
    fn combine(&self, t: Score, children: &[MutexGuard<'_, NodeState>]) -> (f64, f32, f32, f32) {
        let c = self.combiner();
        let evals: SmallVec<[Evaluation; 16]> =
            children.iter().map(|child| child.evaluation_or_bound(-t)).collect();

        let mut proof = f32::INFINITY;
        let mut disproof = 0.0f32;
        let mut log_prod = 0.0f64;
        for e in &evals {
            proof = proof.min(e.disproof_number());
            disproof += e.proof_number();
            log_prod += c.f(e.probability()).ln();
        }
        if proof == 0.0 || disproof == 0.0 {
            return (if proof == 0.0 { 1.0 } else { 0.0 }, proof, disproof, f32::NEG_INFINITY);
        }

        let inv = c.inverse(log_prod.exp());
        let base = log_prod - c.derivative(inv).max(f64::MIN_POSITIVE).ln();
        let priority = evals
            .iter()
            .filter(|e| !e.is_solved() && e.max_log_derivative() > f32::NEG_INFINITY)
            .map(|e| {
                let q = e.probability();
                let term = c.derivative(q).max(f64::MIN_POSITIVE).ln() - c.f(q).ln() + base;
                (term + f64::from(e.max_log_derivative())) as f32
            })
            .fold(f32::NEG_INFINITY, f32::max);
        (1.0 - inv, proof, disproof, priority)
    }

    /// トポロジカル順序のキー（小さいほど葉側）
    ///
    /// パスの子は親と空きマス数が等しいので、パスの子を持つ親を1つ後ろにずらす。
    fn topo_key(inner: &GraphInner, id: NodeId) -> u32 {
        let node = &inner.nodes[id];
        let has_pass = node
            .state
            .lock()
            .children
            .as_ref()
            .is_some_and(|c| c.len() == 1 && c[0].mv.is_pass());
        node.empties() * 2 + u32::from(has_pass)
    }

    /// `from` のすべての祖先を子から順に再計算する（`from` が内部ノードならそれも含む）
    fn recompute_ancestors(&self, inner: &GraphInner, from: NodeId) {
        let mut heap = BinaryHeap::new();
        let mut queued = HashSet::new();
        queued.insert(from);
        heap.push(Reverse((Self::topo_key(inner, from), from)));
        while let Some(Reverse((_, id))) = heap.pop() {
            self.recompute_internal(inner, id);
            let fathers = inner.nodes[id].state.lock().fathers.clone();
            for f in fathers {
                if queued.insert(f) {
                    heap.push(Reverse((Self::topo_key(inner, f), f)));
                }
            }
        }
    }

    /// ルートの追跡範囲から全ノードの追跡範囲を決め直し、評価を子から順に作り直す
    ///
    /// 子の範囲は親の範囲を符号反転したものの和集合。
    fn rebuild_ranges(&self, inner: &GraphInner, weak_lower: Score, weak_upper: Score) {
        let mut order: Vec<(u32, NodeId)> =
            (0..inner.nodes.len()).map(|id| (Self::topo_key(inner, id), id)).collect();
        order.sort_unstable();

        let mut ranges: Vec<Option<(Score, Score)>> = vec![None; inner.nodes.len()];
        ranges[ROOT] = Some((weak_lower, weak_upper));
        for &(_, id) in order.iter().rev() {
            let mut state = inner.nodes[id].state.lock();
            if let Some((lo, hi)) = ranges[id] {
                state.weak_lower = lo;
                state.weak_upper = hi;
            }
            let (lo, hi) = (state.weak_lower, state.weak_upper);
            for link in state.children.iter().flatten() {
                let range = ranges[link.node].get_or_insert((-hi, -lo));
                range.0 = range.0.min(-hi);
                range.1 = range.1.max(-lo);
            }
        }

        for &(_, id) in &order {
            let node = &inner.nodes[id];
            let is_leaf = node.state.lock().is_leaf();
            if is_leaf {
                let mut state = node.state.lock();
                self.refresh_leaf(node.position(), node.empties(), &mut state);
            } else {
                self.recompute_internal(inner, id);
            }
        }
        debug!(
            "weak bounds rebuilt: {weak_lower}..={weak_upper} over {} nodes",
            inner.nodes.len()
        );
    }

    /// グラフの整合性を検査する（探索中でないときに呼ぶ）
    pub fn check_invariants(&self) -> Result<(), SearchError> {
        let inner = self.inner.write();
        for (id, node) in inner.nodes.iter().enumerate() {
            let state = node.state.lock();
            let fail = |msg: String| Err(SearchError::invariant(format!("node {id}: {msg}")));

            if inner.index.get(&node.position()) != Some(&id) {
                return fail("index does not point back to node".into());
            }
            if state.lower > state.upper {
                return fail(format!("lower {} > upper {}", state.lower, state.upper));
            }
            if state.threads_working != 0 {
                return fail(format!("threads_working = {} while idle", state.threads_working));
            }
            for (t, e) in targets_between(MIN_TARGET, MAX_TARGET)
                .filter_map(|t| state.evaluation(t).map(|e| (t, e)))
            {
                if !e.is_consistent() {
                    return fail(format!("inconsistent evaluation at {t}: {e:?}"));
                }
                if state.is_solved() && !e.is_solved() {
                    return fail(format!("solved node has unsolved evaluation at {t}"));
                }
            }

            if let Some(children) = &state.children {
                let expected = node.position().mobility().max(1) as usize;
                if children.len() != expected {
                    return fail(format!("{} children, expected {expected}", children.len()));
                }
                for link in children {
                    let Some(child) = inner.nodes.get(link.node) else {
                        return fail(format!("child {} missing", link.node));
                    };
                    let cs = child.state.lock();
                    if !cs.fathers.contains(&id) {
                        return fail(format!("child {} does not list father", link.node));
                    }
                    let related = if link.mv.is_pass() {
                        child.position() == node.position().pass() && child.empties() == node.empties()
                    } else {
                        child.empties() + 1 == node.empties()
                            && node.position().play(link.mv) == Some(child.position())
                    };
                    if !related {
                        return fail(format!("child {} is not reached by {}", link.node, link.mv));
                    }
                    if cs.weak_lower > -state.weak_upper || cs.weak_upper < -state.weak_lower {
                        return fail(format!("child {} does not track father's range", link.node));
                    }
                }
            }

            let mut father_descendants = 0;
            for &f in &state.fathers {
                let Some(father) = inner.nodes.get(f) else {
                    return fail(format!("father {f} missing"));
                };
                let fs = father.state.lock();
                if !fs.children.iter().flatten().any(|link| link.node == id) {
                    return fail(format!("father {f} does not list child"));
                }
                father_descendants += fs.descendants;
            }
            if !state.fathers.is_empty() && state.descendants > father_descendants {
                return fail(format!(
                    "descendants {} exceed fathers' {father_descendants}",
                    state.descendants
                ));
            }
        }
        Ok(())
    }
}
