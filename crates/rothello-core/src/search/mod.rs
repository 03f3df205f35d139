//! 探索モジュール
//!
//! - `alpha_beta`: 置換表・手順付け・安定石カットを備えた fail-soft negamax
//! - `combiner`: 兄弟局面の確率を合成する関数族
//! - `error_model`: 浅い探索値の誤差モデル（正規分布）
//! - `evaluation` / `node` / `graph`: 局面 DAG と、ターゲットごとの確率評価
//! - `selection`: 最良の葉の選択（所有マーカーによる排他）
//! - `driver`: マルチスレッドの探索ドライバ

mod alpha_beta;
mod combiner;
mod driver;
mod error;
pub mod error_model;
mod evaluation;
mod graph;
mod node;
mod ordering;
mod params;
mod selection;

pub use alpha_beta::AlphaBetaSolver;
pub use combiner::{
    CombinerKind, ExponentialCombiner, LogExponentialCombiner, PolynomialCombiner, ScoreCombiner,
};
pub use driver::{DriverState, SearchDriver, SearchReport, StopHandle};
pub use error::SearchError;
pub use evaluation::{Evaluation, PROB_MAX, PROB_MAX_UNSOLVED, PROB_MIN_UNSOLVED};
pub use graph::{ChildSeed, LeafOutcome, PositionGraph, Seed};
pub use node::{ChildLink, NodeId};
pub use params::SearchParams;
pub use selection::{LeafPath, PathStep};
