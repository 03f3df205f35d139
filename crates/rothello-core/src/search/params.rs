//! 探索パラメータ
//!
//! 調整可能な定数はすべてここに集める。TOML などから `serde` で読み込める。

use serde::{Deserialize, Serialize};

use super::combiner::CombinerKind;

/// 探索パラメータ
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchParams {
    /// ワーカースレッド数
    pub threads: usize,
    /// 局面グラフのノード数上限（超えると葉の展開をやめて深読みに切り替える）
    pub max_graph_nodes: usize,
    /// 置換表サイズ（MB）
    pub tt_size_mb: usize,
    /// 置換表を丸ごとクリアする使用率
    pub tt_fill_threshold: f64,
    /// 完全読みソルバーへ委譲する空きマス数
    pub exact_solver_empties: u32,
    /// 新しい葉の評価に使う探索深さ
    pub probe_depth: u32,
    /// 葉を完全読みで解決してよい空きマス数の上限
    pub max_solve_empties: u32,
    /// この空きマス数以下の葉は常に完全読みで解決する
    pub always_solve_empties: u32,
    /// 証明数・反証数の小さい方がこれ未満なら完全読みで解決する
    pub solve_proof_threshold: f32,
    /// 深読みで使うノード数（葉の訪問回数に対する倍率）
    pub deepen_multiplier: f64,
    /// 深読みの訪問1回あたりの基準ノード数
    pub deepen_base_nodes: u64,
    /// 誤差モデルの標準偏差に掛ける倍率
    pub error_multiplier: f64,
    /// この確率以上のターゲットは追跡範囲の下側から外す
    pub weak_bound_high: f64,
    /// この確率以下のターゲットは追跡範囲の上側から外す
    pub weak_bound_low: f64,
    /// 追跡範囲（weak bounds）を見直す反復間隔
    pub weak_bounds_interval: u64,
    /// 予算超過後に探索を続けてよい上限（予算に対する倍率）
    pub budget_hysteresis: f64,
    /// 候補の葉がないときの待機時間（マイクロ秒）
    pub wait_micros: u64,
    /// 完全読みモードで反証数による手順付けを使う空きマス数の下限
    pub endgame_ordering_empties: u32,
    /// 静的手順付けでの相手着手可能数の重み
    pub mobility_weight: i32,
    /// 確率の合成関数
    pub combiner: CombinerKind,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            max_graph_nodes: 50_000,
            tt_size_mb: 64,
            tt_fill_threshold: 0.8,
            exact_solver_empties: 8,
            probe_depth: 3,
            max_solve_empties: 16,
            always_solve_empties: 10,
            solve_proof_threshold: 20_000.0,
            deepen_multiplier: 2.0,
            deepen_base_nodes: 2_000,
            error_multiplier: 1.0,
            weak_bound_high: 0.98,
            weak_bound_low: 0.02,
            weak_bounds_interval: 64,
            budget_hysteresis: 1.25,
            wait_micros: 500,
            endgame_ordering_empties: 14,
            mobility_weight: 16,
            combiner: CombinerKind::default(),
        }
    }
}

impl SearchParams {
    /// 値域を正規化したコピー
    pub fn sanitized(&self) -> Self {
        let mut p = self.clone();
        p.threads = p.threads.max(1);
        p.max_graph_nodes = p.max_graph_nodes.max(1);
        p.tt_size_mb = p.tt_size_mb.max(1);
        p.tt_fill_threshold = p.tt_fill_threshold.clamp(0.05, 1.0);
        p.always_solve_empties = p.always_solve_empties.min(p.max_solve_empties);
        p.deepen_multiplier = p.deepen_multiplier.max(0.0);
        p.error_multiplier = p.error_multiplier.max(0.01);
        p.weak_bound_high = p.weak_bound_high.clamp(0.5, 1.0);
        p.weak_bound_low = p.weak_bound_low.clamp(0.0, 0.5);
        p.weak_bounds_interval = p.weak_bounds_interval.max(1);
        p.budget_hysteresis = p.budget_hysteresis.max(1.0);
        p
    }
}
