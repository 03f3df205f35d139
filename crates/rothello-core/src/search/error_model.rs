//! 浅い探索値の誤差モデル
//!
//! 葉の真のスコアを「探索値を平均とする正規分布」とみなし、
//! 各ターゲットを上回る確率を求める。標準偏差は空きマス数ごとの較正テーブルと、
//! 探索深さに応じた倍率の積。

use std::sync::LazyLock;

use crate::types::{EVAL_SCALE, Score};

/// 空きマス数ごとの深さ1評価の誤差（標準偏差、スコア単位）
///
/// 序盤ほど大きく、終盤では石差数個程度に収まる。
static ERROR_TABLE: LazyLock<[f64; 65]> = LazyLock::new(|| {
    let mut table = [0.0; 65];
    for (empties, sigma) in table.iter_mut().enumerate() {
        let e = empties as f64;
        let disks = 2.0 + 0.35 * e - 0.0025 * e * e;
        *sigma = disks.max(1.0) * f64::from(EVAL_SCALE);
    }
    table
});

/// 空きマス数 `empties` での誤差の標準偏差
#[inline]
pub fn expected_error(empties: u32) -> f64 {
    ERROR_TABLE[empties.min(64) as usize]
}

/// 探索深さ `depth` の値に対する標準偏差の倍率
pub fn depth_multiplier(depth: u32) -> f64 {
    1.0 / (1.0 + 0.12 * f64::from(depth.saturating_sub(1)))
}

/// 誤差関数（Abramowitz-Stegun 7.1.26、最大誤差 1.5e-7）
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// 標準正規分布の累積分布関数
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// 真のスコアが `target` を上回る確率
pub fn probability_above(target: Score, estimate: Score, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return if estimate > target { 1.0 } else { 0.0 };
    }
    1.0 - normal_cdf(f64::from(target - estimate) / sigma)
}
