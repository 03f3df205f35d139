//! 局面グラフのノード

use parking_lot::Mutex;

use super::evaluation::Evaluation;
use crate::board::Position;
use crate::types::{
    MAX_SCORE, MAX_TARGET, MIN_SCORE, MIN_TARGET, Move, NUM_TARGETS, Score, TARGET_STEP,
    target_index,
};

/// アリーナ内のノード番号
pub type NodeId = usize;

/// 子への辺
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildLink {
    pub mv: Move,
    pub node: NodeId,
}

/// ノードの可変部分（ノードごとの Mutex で保護）
#[derive(Debug, Clone)]
pub(crate) struct NodeState {
    /// `None` なら葉
    pub children: Option<Vec<ChildLink>>,
    pub fathers: Vec<NodeId>,
    /// 葉の探索値
    pub leaf_estimate: Score,
    /// 葉の誤差倍率（探索深さと設定から決まる）
    pub stddev_multiplier: f64,
    /// 証明済みの下界（スコア >= lower）
    pub lower: Score,
    /// 証明済みの上界（スコア <= upper）
    pub upper: Score,
    /// 追跡中のターゲット範囲（両端を含む）
    pub weak_lower: Score,
    pub weak_upper: Score,
    pub evaluations: [Option<Evaluation>; NUM_TARGETS],
    /// このノードを通った選択の回数
    pub descendants: u64,
    /// このノードの下で作業中のワーカー数
    pub threads_working: u32,
}

impl NodeState {
    pub fn new(weak_lower: Score, weak_upper: Score) -> Self {
        Self {
            children: None,
            fathers: Vec::new(),
            leaf_estimate: 0,
            stddev_multiplier: 1.0,
            lower: MIN_SCORE,
            upper: MAX_SCORE,
            weak_lower,
            weak_upper,
            evaluations: [None; NUM_TARGETS],
            descendants: 0,
            threads_working: 0,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    #[inline]
    pub fn is_solved(&self) -> bool {
        self.lower == self.upper
    }

    #[inline]
    pub fn tracks(&self, target: Score) -> bool {
        (self.weak_lower..=self.weak_upper).contains(&target)
    }

    /// 追跡中のターゲットの評価
    ///
    /// 範囲外になった評価は訪問回数を残すために保持するが、値は古いので見せない。
    #[inline]
    pub fn evaluation(&self, target: Score) -> Option<&Evaluation> {
        if !self.tracks(target) {
            return None;
        }
        self.evaluations[target_index(target)].as_ref()
    }

    #[inline]
    pub fn evaluation_mut(&mut self, target: Score) -> Option<&mut Evaluation> {
        if !self.tracks(target) {
            return None;
        }
        self.evaluations[target_index(target)].as_mut()
    }

    /// 保存済みの評価がなければ作成して返す（範囲外で保持していた評価もここで再利用する）
    pub fn get_or_add(&mut self, target: Score) -> &mut Evaluation {
        self.evaluations[target_index(target)].get_or_insert_with(|| Evaluation::de_facto(true))
    }

    /// ターゲット `target` の評価
    ///
    /// 証明済みの境界で決まるならそれを、追跡範囲外なら範囲のどちら側かで
    /// 「事実上の」評価を返す。
    pub fn evaluation_or_bound(&self, target: Score) -> Evaluation {
        if target < self.lower {
            Evaluation::proved()
        } else if target > self.upper {
            Evaluation::disproved()
        } else if let Some(e) = self.evaluation(target) {
            *e
        } else {
            Evaluation::de_facto(target < self.weak_lower)
        }
    }

    /// スコア > `target` の確率
    pub fn probability_at(&self, target: Score) -> f64 {
        self.evaluation_or_bound(target).probability()
    }

    /// 全ターゲットの確率から求めたスコアの期待値
    pub fn expected_score(&self) -> Score {
        let mut sum = 0.0;
        let mut t = MIN_TARGET;
        while t <= MAX_TARGET {
            sum += self.probability_at(t);
            t += TARGET_STEP;
        }
        MIN_TARGET - 100 + (sum * f64::from(TARGET_STEP)).round() as Score
    }
}

/// 局面グラフのノード
///
/// 局面・作成時の深さ・空きマス数は不変。それ以外はノードごとのロックで保護する。
#[derive(Debug)]
pub struct PositionNode {
    position: Position,
    depth: u32,
    empties: u32,
    pub(crate) state: Mutex<NodeState>,
}

impl PositionNode {
    pub(crate) fn new(position: Position, depth: u32, weak_lower: Score, weak_upper: Score) -> Self {
        Self {
            position,
            depth,
            empties: position.empty_count(),
            state: Mutex::new(NodeState::new(weak_lower, weak_upper)),
        }
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    /// 作成時のルートからの手数
    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn empties(&self) -> u32 {
        self.empties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::evaluation::PROB_MIN_UNSOLVED;

    #[test]
    fn test_node_state_bounds_decide_evaluations() {
        let mut state = NodeState::new(-300, 300);
        state.lower = -200;
        state.upper = 400;
        assert!(state.evaluation_or_bound(-300).is_proved());
        assert!(state.evaluation_or_bound(500).is_disproved());
        // 追跡範囲内だが評価がない
        assert!(!state.evaluation_or_bound(100).is_solved());
    }

    #[test]
    fn test_node_state_expected_score_exact() {
        let mut state = NodeState::new(MIN_TARGET, MAX_TARGET);
        state.lower = 1200;
        state.upper = 1200;
        assert_eq!(state.expected_score(), 1200);

        state.lower = MIN_SCORE;
        state.upper = MIN_SCORE;
        assert_eq!(state.expected_score(), MIN_SCORE);
    }

    #[test]
    fn test_node_state_untracked_evaluations_hidden_but_kept() {
        let mut state = NodeState::new(-100, 100);
        state.evaluations = [Some(Evaluation::leaf(0.5, 2.0, 2.0)); NUM_TARGETS];
        state.get_or_add(300).add_descendants(5);
        assert!(state.evaluation(-100).is_some());
        assert!(state.evaluation(100).is_some());
        assert!(state.evaluation(300).is_none());
        assert!(state.evaluation_mut(-300).is_none());
        // 範囲外は事実上の評価になる
        assert_eq!(state.evaluation_or_bound(300).prob(), PROB_MIN_UNSOLVED);

        // 範囲を広げ直すと訪問回数が戻る
        state.weak_upper = 300;
        assert_eq!(state.evaluation(300).map(Evaluation::descendants), Some(5));
        state.get_or_add(300).set_leaf(0.3, 2.0, 2.0);
        assert_eq!(state.evaluation(300).map(Evaluation::descendants), Some(5));
    }
}
