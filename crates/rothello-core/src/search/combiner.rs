//! 確率の合成関数
//!
//! 手番側は良い手を1つ見つければよいので、親の「スコア > t」の確率は
//! 子の「スコア > -t」がすべて成り立つ確率の補数になる。
//! 子同士の相関をモデル化するため、単調関数 `f` を通して積を取る:
//!
//! `P(親 > t) = 1 - f⁻¹(Π f(P(子 > -t)))`
//!
//! `f(x) = x` なら独立仮定と一致する。凹関数なら子同士の正の相関を表し、
//! 独立仮定より親の確率を控えめに見積もる。

use std::fmt;

use serde::{Deserialize, Serialize};

/// `[0, 1] -> [0, 1]` の単調増加関数（`f(0) = 0`, `f(1) = 1`）
pub trait ScoreCombiner: Send + Sync + fmt::Debug {
    fn f(&self, x: f64) -> f64;

    /// `f` の逆関数
    fn inverse(&self, y: f64) -> f64;

    /// `f` の導関数
    fn derivative(&self, x: f64) -> f64;

    fn name(&self) -> &'static str;
}

/// `f(x) = (e^{λx} - 1) / (e^λ - 1)`
#[derive(Debug, Clone, Copy)]
pub struct ExponentialCombiner {
    lambda: f64,
    denom: f64,
}

impl ExponentialCombiner {
    pub fn new(lambda: f64) -> Self {
        // λ → 0 で恒等関数に退化するので下限を設ける
        let lambda = if lambda.abs() < 1e-6 { 1e-6 } else { lambda };
        Self {
            lambda,
            denom: lambda.exp_m1(),
        }
    }
}

impl ScoreCombiner for ExponentialCombiner {
    fn f(&self, x: f64) -> f64 {
        (self.lambda * x).exp_m1() / self.denom
    }

    fn inverse(&self, y: f64) -> f64 {
        (y * self.denom).ln_1p() / self.lambda
    }

    fn derivative(&self, x: f64) -> f64 {
        self.lambda * (self.lambda * x).exp() / self.denom
    }

    fn name(&self) -> &'static str {
        "exponential"
    }
}

/// `f(x) = 1 - (1 - x)^k`
#[derive(Debug, Clone, Copy)]
pub struct PolynomialCombiner {
    exponent: f64,
}

impl PolynomialCombiner {
    pub fn new(exponent: f64) -> Self {
        Self {
            exponent: exponent.max(1e-3),
        }
    }
}

impl ScoreCombiner for PolynomialCombiner {
    fn f(&self, x: f64) -> f64 {
        1.0 - (1.0 - x).powf(self.exponent)
    }

    fn inverse(&self, y: f64) -> f64 {
        1.0 - (1.0 - y).max(0.0).powf(1.0 / self.exponent)
    }

    fn derivative(&self, x: f64) -> f64 {
        self.exponent * (1.0 - x).max(0.0).powf(self.exponent - 1.0)
    }

    fn name(&self) -> &'static str {
        "polynomial"
    }
}

/// `f(x) = ln(1 + λx) / ln(1 + λ)`
#[derive(Debug, Clone, Copy)]
pub struct LogExponentialCombiner {
    lambda: f64,
    denom: f64,
}

impl LogExponentialCombiner {
    pub fn new(lambda: f64) -> Self {
        let lambda = lambda.max(1e-6);
        Self {
            lambda,
            denom: lambda.ln_1p(),
        }
    }
}

impl ScoreCombiner for LogExponentialCombiner {
    fn f(&self, x: f64) -> f64 {
        (self.lambda * x).ln_1p() / self.denom
    }

    fn inverse(&self, y: f64) -> f64 {
        (y * self.denom).exp_m1() / self.lambda
    }

    fn derivative(&self, x: f64) -> f64 {
        self.lambda / ((1.0 + self.lambda * x) * self.denom)
    }

    fn name(&self) -> &'static str {
        "logexponential"
    }
}

/// 合成関数の選択（設定ファイル用）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CombinerKind {
    Exponential { lambda: f64 },
    Polynomial { exponent: f64 },
    LogExponential { lambda: f64 },
}

impl Default for CombinerKind {
    fn default() -> Self {
        CombinerKind::Exponential { lambda: -3.0 }
    }
}

impl CombinerKind {
    pub fn build(&self) -> Box<dyn ScoreCombiner> {
        match *self {
            CombinerKind::Exponential { lambda } => Box::new(ExponentialCombiner::new(lambda)),
            CombinerKind::Polynomial { exponent } => Box::new(PolynomialCombiner::new(exponent)),
            CombinerKind::LogExponential { lambda } => {
                Box::new(LogExponentialCombiner::new(lambda))
            }
        }
    }
}
