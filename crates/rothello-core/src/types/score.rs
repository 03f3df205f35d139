//! スコアとスコアターゲット
//!
//! スコアは石差を `EVAL_SCALE` 倍した整数で扱う。終局スコアは常に偶数の石差になるので、
//! ターゲットは奇数の石差（×100）に置く。これによりスコアがターゲットと一致することはなく、
//! 「スコアがターゲット以上」と「スコアがターゲットより大きい」は同じ意味になる。

/// スコア（石差 ×100）
pub type Score = i32;

/// 石差1個あたりの内部スケール
pub const EVAL_SCALE: i32 = 100;

/// 取り得る最小スコア（全滅負け）
pub const MIN_SCORE: Score = -64 * EVAL_SCALE;
/// 取り得る最大スコア（全滅勝ち）
pub const MAX_SCORE: Score = 64 * EVAL_SCALE;
/// Alpha-Beta の番兵値
pub const SCORE_INF: Score = MAX_SCORE + 1;

/// 最小ターゲット
pub const MIN_TARGET: Score = -6300;
/// 最大ターゲット
pub const MAX_TARGET: Score = 6300;
/// ターゲット間隔（石差2個分）
pub const TARGET_STEP: Score = 200;
/// ターゲット数
pub const NUM_TARGETS: usize = ((MAX_TARGET - MIN_TARGET) / TARGET_STEP) as usize + 1;

const _: () = assert!(NUM_TARGETS == 64);

/// ターゲットの配列インデックス
#[inline]
pub const fn target_index(target: Score) -> usize {
    debug_assert!(is_target(target));
    ((target - MIN_TARGET) / TARGET_STEP) as usize
}

/// インデックスからターゲットを復元
#[inline]
pub const fn target_at(index: usize) -> Score {
    MIN_TARGET + index as Score * TARGET_STEP
}

/// 有効なターゲットかどうか
#[inline]
pub const fn is_target(value: Score) -> bool {
    value >= MIN_TARGET && value <= MAX_TARGET && (value - MIN_TARGET) % TARGET_STEP == 0
}

/// `score` 以上の最小ターゲット（範囲外は `MIN_TARGET..=MAX_TARGET` に丸める）
#[inline]
pub fn target_at_or_above(score: Score) -> Score {
    let k = (score - MIN_TARGET).div_euclid(TARGET_STEP);
    let mut t = MIN_TARGET + k * TARGET_STEP;
    if t < score {
        t += TARGET_STEP;
    }
    t.clamp(MIN_TARGET, MAX_TARGET)
}

/// `score` 以下の最大ターゲット（範囲外は `MIN_TARGET..=MAX_TARGET` に丸める）
#[inline]
pub fn target_at_or_below(score: Score) -> Score {
    let k = (score - MIN_TARGET).div_euclid(TARGET_STEP);
    (MIN_TARGET + k * TARGET_STEP).clamp(MIN_TARGET, MAX_TARGET)
}

/// `lower..=upper` に含まれるターゲットを昇順に列挙
pub fn targets_between(lower: Score, upper: Score) -> impl Iterator<Item = Score> {
    let first = target_at_or_above(lower.max(MIN_TARGET));
    let last = target_at_or_below(upper.min(MAX_TARGET));
    let count = if lower > MAX_TARGET || upper < MIN_TARGET || first > last {
        0
    } else {
        ((last - first) / TARGET_STEP + 1) as usize
    };
    (0..count).map(move |i| first + i as Score * TARGET_STEP)
}

/// 石差からスコアへ
#[inline]
pub const fn from_disks(disks: i32) -> Score {
    disks * EVAL_SCALE
}
