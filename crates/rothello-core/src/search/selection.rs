//! 最良の葉の選択
//!
//! ルートの追跡ターゲットを順位付けし、ターゲットの符号を反転しながら最良の子へ降りる。
//! 葉に着いたら所有マーカーを立てて確保し、経路上のノードの作業中カウンタを増やす。
//! カウンタは `PositionGraph::apply` または `PositionGraph::release` でちょうど1回ずつ戻す。

use smallvec::SmallVec;

use super::evaluation::{Evaluation, PROB_MAX_UNSOLVED, PROB_MIN_UNSOLVED};
use super::graph::{GraphInner, PositionGraph};
use super::node::NodeId;
use crate::board::Position;
use crate::types::{Score, targets_between};

/// 経路の1ステップ（ノードと、そのノードの手番側から見たターゲット）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub node: NodeId,
    pub target: Score,
}

/// 確保した葉までの経路
#[derive(Debug, Clone, PartialEq)]
pub struct LeafPath {
    steps: Vec<PathStep>,
    position: Position,
    proof_number: f32,
    disproof_number: f32,
    leaf_descendants: u64,
}

impl LeafPath {
    /// ルートから葉までのステップ
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn leaf(&self) -> NodeId {
        self.steps.last().map_or(0, |s| s.node)
    }

    /// 葉でのターゲット
    pub fn target(&self) -> Score {
        self.steps.last().map_or(0, |s| s.target)
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// 葉の証明数（選択時点）
    pub fn proof_number(&self) -> f32 {
        self.proof_number
    }

    /// 葉の反証数（選択時点）
    pub fn disproof_number(&self) -> f32 {
        self.disproof_number
    }

    /// 葉がこれまでに選ばれた回数
    pub fn leaf_descendants(&self) -> u64 {
        self.leaf_descendants
    }
}

/// 降り方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// 確率がほぼ 1: 証明数を減らす
    Proving,
    /// 確率がほぼ 0: 反証数を減らす
    Disproving,
    /// 探索優先度に従う
    Probabilistic,
}

fn mode(e: &Evaluation) -> Mode {
    match e.prob() {
        PROB_MAX_UNSOLVED => Mode::Proving,
        PROB_MIN_UNSOLVED => Mode::Disproving,
        _ => Mode::Probabilistic,
    }
}

/// ルートでのターゲットの順位値（大きいほど先に探す）
fn root_rank(e: &Evaluation) -> f32 {
    match mode(e) {
        Mode::Proving => -e.proof_number().ln(),
        Mode::Disproving => -e.disproof_number().ln(),
        Mode::Probabilistic => e.max_log_derivative(),
    }
}

impl PositionGraph {
    /// `alpha..=beta` の追跡ターゲットの中から最も価値のある葉を選んで確保する
    ///
    /// 未解決のターゲットがない、または候補の葉がすべて他のワーカーに確保されていれば `None`。
    pub fn select(&self, alpha: Score, beta: Score) -> Option<LeafPath> {
        let inner = self.inner().read();
        let root = inner.nodes.first()?;

        let mut candidates: SmallVec<[(f32, Score); 64]> = {
            let state = root.state.lock();
            let lo = alpha.max(state.weak_lower);
            let hi = beta.min(state.weak_upper);
            targets_between(lo, hi)
                .filter_map(|t| {
                    let e = state.evaluation(t)?;
                    (!e.is_solved()).then(|| (root_rank(e), t))
                })
                .collect()
        };
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        for (_, target) in candidates {
            let mut steps = Vec::new();
            if let Some(mut path) = self.descend(&inner, 0, target, &mut steps) {
                path.steps = steps;
                return Some(path);
            }
        }
        None
    }

    /// `id` からターゲット `target` で降りる。成功したら `steps` に経路が入る。
    fn descend(
        &self,
        inner: &GraphInner,
        id: NodeId,
        target: Score,
        steps: &mut Vec<PathStep>,
    ) -> Option<LeafPath> {
        let node = &inner.nodes[id];
        let (children, eval) = {
            let mut state = node.state.lock();
            let eval = state.evaluation_or_bound(target);
            if eval.is_solved() {
                return None;
            }
            match &state.children {
                Some(children) => (children.clone(), eval),
                None => {
                    if state.threads_working > 0 {
                        return None;
                    }
                    state.threads_working = 1;
                    steps.push(PathStep { node: id, target });
                    return Some(LeafPath {
                        steps: Vec::new(),
                        position: node.position(),
                        proof_number: eval.proof_number(),
                        disproof_number: eval.disproof_number(),
                        leaf_descendants: state.descendants,
                    });
                }
            }
        };

        let c = self.combiner();
        let node_mode = mode(&eval);
        let mut ranked: SmallVec<[(f32, NodeId); 32]> = children
            .iter()
            .filter_map(|link| {
                let child = inner.nodes[link.node].state.lock().evaluation_or_bound(-target);
                if child.is_solved() {
                    return None;
                }
                let key = match node_mode {
                    // 親の証明数 = 子の反証数の最小値
                    Mode::Proving => -child.disproof_number(),
                    // 親の反証数 = 子の証明数の和
                    Mode::Disproving => -child.proof_number(),
                    Mode::Probabilistic => {
                        let q = child.probability();
                        (c.derivative(q).max(f64::MIN_POSITIVE).ln() - c.f(q).ln()) as f32
                            + child.max_log_derivative()
                    }
                };
                Some((key, link.node))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        steps.push(PathStep { node: id, target });
        for (_, child) in ranked {
            if let Some(path) = self.descend(inner, child, -target, steps) {
                node.state.lock().threads_working += 1;
                return Some(path);
            }
        }
        steps.pop();
        None
    }
}
