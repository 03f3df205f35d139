//! 完全読みコストの推定
//!
//! 空きマス数・着手可能数・評価値とターゲットの距離から、証明（反証）に必要な
//! 完全読みノード数を対数線形モデルで見積もる。確率的探索ではこれを葉の証明数・反証数として使う。

use crate::board::Position;
use crate::types::{EVAL_SCALE, Score};

/// 未解決の証明数・反証数の下限
pub const MIN_PROOF_NUMBER: f32 = 1.0;
/// 未解決の証明数・反証数の上限
pub const MAX_PROOF_NUMBER: f32 = 1.0e30;

/// 指数部の上限（オーバーフロー防止）
const MAX_LOG: f64 = 60.0;

/// 完全読みコストの対数線形モデル
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndgameCostModel {
    /// 切片（log ノード数）
    pub intercept: f64,
    /// 空きマス1個あたりの log ノード数
    pub per_empty: f64,
    /// 評価値とターゲットの距離（石差1個）あたりの log ノード数の減少
    pub distance_slope: f64,
    /// 距離項の絶対値上限
    pub max_distance_log: f64,
    /// 反論側の着手可能数に対する指数
    pub mobility_exponent: f64,
}

impl Default for EndgameCostModel {
    fn default() -> Self {
        Self {
            intercept: 0.5,
            per_empty: 0.55,
            distance_slope: 0.15,
            max_distance_log: 12.0,
            mobility_exponent: 0.5,
        }
    }
}

impl EndgameCostModel {
    fn estimate(&self, empties: u32, mobility: u32, distance: Score) -> f32 {
        let distance_disks = f64::from(distance) / f64::from(EVAL_SCALE);
        let distance_log = (-self.distance_slope * distance_disks)
            .clamp(-self.max_distance_log, self.max_distance_log);
        let log_nodes = self.intercept
            + self.per_empty * f64::from(empties)
            + self.mobility_exponent * f64::from(1 + mobility).ln()
            + distance_log;
        (log_nodes.min(MAX_LOG).exp() as f32).clamp(MIN_PROOF_NUMBER, MAX_PROOF_NUMBER)
    }

    /// 「スコア > target」を証明するコスト
    ///
    /// 手番側は良い手を1つ示せばよく、相手の全応手を読み切る必要があるので相手の着手可能数を使う。
    pub fn proof_number(&self, pos: &Position, target: Score, estimate: Score) -> f32 {
        let mobility = pos.opponent_moves().count_ones();
        self.estimate(pos.empty_count(), mobility, estimate - target)
    }

    /// 「スコア < target」を証明するコスト
    ///
    /// 手番側の全着手を読み切る必要があるので手番側の着手可能数を使う。
    pub fn disproof_number(&self, pos: &Position, target: Score, estimate: Score) -> f32 {
        let mobility = pos.mobility();
        self.estimate(pos.empty_count(), mobility, target - estimate)
    }
}
