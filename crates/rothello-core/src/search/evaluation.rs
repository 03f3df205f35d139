//! ターゲットごとの評価レコード

use crate::endgame::{MAX_PROOF_NUMBER, MIN_PROOF_NUMBER};

/// 確率の量子化ステップ数（`prob / PROB_MAX` が確率）
pub const PROB_MAX: u8 = 255;
/// 未解決の評価が取りうる最小の量子化確率
pub const PROB_MIN_UNSOLVED: u8 = 1;
/// 未解決の評価が取りうる最大の量子化確率
pub const PROB_MAX_UNSOLVED: u8 = PROB_MAX - 1;

/// 確率を量子化
#[inline]
pub fn quantize(p: f64) -> u8 {
    (p.clamp(0.0, 1.0) * f64::from(PROB_MAX)).round() as u8
}

/// 1つのターゲット `t` に対する評価
///
/// - `prob`: スコア > t の確率
/// - `proof_number`: スコア > t を証明するコスト（0 なら証明済み）
/// - `disproof_number`: スコア < t を証明するコスト（0 なら反証済み）
/// - `max_log_derivative`: 探索優先度。この局面の確率が葉の変化にどれだけ敏感か（対数）。
///   解決済みなら `-inf`。
/// - `descendants`: このターゲットのために子孫を訪問した回数
///
/// 不変条件: `proof_number == 0 ⇔ prob == PROB_MAX`, `disproof_number == 0 ⇔ prob == 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    prob: u8,
    proof_number: f32,
    disproof_number: f32,
    max_log_derivative: f32,
    descendants: u64,
}

impl Evaluation {
    pub const fn proved() -> Self {
        Self {
            prob: PROB_MAX,
            proof_number: 0.0,
            disproof_number: f32::INFINITY,
            max_log_derivative: f32::NEG_INFINITY,
            descendants: 0,
        }
    }

    pub const fn disproved() -> Self {
        Self {
            prob: 0,
            proof_number: f32::INFINITY,
            disproof_number: 0.0,
            max_log_derivative: f32::NEG_INFINITY,
            descendants: 0,
        }
    }

    /// 探索する価値のない未解決評価（追跡範囲外のターゲットの代用）
    pub const fn de_facto(likely: bool) -> Self {
        Self {
            prob: if likely { PROB_MAX_UNSOLVED } else { PROB_MIN_UNSOLVED },
            proof_number: MAX_PROOF_NUMBER,
            disproof_number: MAX_PROOF_NUMBER,
            max_log_derivative: f32::NEG_INFINITY,
            descendants: 0,
        }
    }

    /// 葉の評価
    pub fn leaf(prob: f64, proof_number: f32, disproof_number: f32) -> Self {
        let mut e = Self::proved();
        e.set_leaf(prob, proof_number, disproof_number);
        e
    }

    #[inline]
    pub fn prob(&self) -> u8 {
        self.prob
    }

    #[inline]
    pub fn probability(&self) -> f64 {
        f64::from(self.prob) / f64::from(PROB_MAX)
    }

    #[inline]
    pub fn proof_number(&self) -> f32 {
        self.proof_number
    }

    #[inline]
    pub fn disproof_number(&self) -> f32 {
        self.disproof_number
    }

    #[inline]
    pub fn max_log_derivative(&self) -> f32 {
        self.max_log_derivative
    }

    #[inline]
    pub fn descendants(&self) -> u64 {
        self.descendants
    }

    #[inline]
    pub fn is_proved(&self) -> bool {
        self.prob == PROB_MAX
    }

    #[inline]
    pub fn is_disproved(&self) -> bool {
        self.prob == 0
    }

    #[inline]
    pub fn is_solved(&self) -> bool {
        self.is_proved() || self.is_disproved()
    }

    pub(crate) fn add_descendants(&mut self, n: u64) {
        self.descendants += n;
    }

    pub fn set_proved(&mut self) {
        *self = Self { descendants: self.descendants, ..Self::proved() };
    }

    pub fn set_disproved(&mut self) {
        *self = Self { descendants: self.descendants, ..Self::disproved() };
    }

    /// 葉として設定（未解決）
    ///
    /// 優先度は量子化後の確率 `p` に対する `ln(p(1-p))`。
    pub fn set_leaf(&mut self, prob: f64, proof_number: f32, disproof_number: f32) {
        self.prob = quantize(prob).clamp(PROB_MIN_UNSOLVED, PROB_MAX_UNSOLVED);
        self.proof_number = proof_number.clamp(MIN_PROOF_NUMBER, MAX_PROOF_NUMBER);
        self.disproof_number = disproof_number.clamp(MIN_PROOF_NUMBER, MAX_PROOF_NUMBER);
        let p = self.probability();
        self.max_log_derivative = (p * (1.0 - p)).ln() as f32;
    }

    /// 子の評価から再計算した値を設定
    ///
    /// 証明数・反証数が 0 なら解決済み、そうでなければ確率を未解決の範囲に丸める。
    pub fn set_internal(
        &mut self,
        prob: f64,
        proof_number: f32,
        disproof_number: f32,
        max_log_derivative: f32,
    ) {
        if proof_number <= 0.0 {
            self.set_proved();
        } else if disproof_number <= 0.0 {
            self.set_disproved();
        } else {
            self.prob = quantize(prob).clamp(PROB_MIN_UNSOLVED, PROB_MAX_UNSOLVED);
            self.proof_number = proof_number;
            self.disproof_number = disproof_number;
            self.max_log_derivative = max_log_derivative;
        }
    }

    /// 不変条件を満たすか
    pub fn is_consistent(&self) -> bool {
        (self.proof_number == 0.0) == (self.prob == PROB_MAX)
            && (self.disproof_number == 0.0) == (self.prob == 0)
    }
}
