//! rothello-core: オセロ（8×8）の探索・評価コア
//!
//! - `board`: 局面（手番側・相手側の2枚のビットボード）と合法手生成
//! - `stability`: 確定石による最終スコアの上界
//! - `eval`: 深さ1評価関数の契約と石位置＋着手可能数による実装
//! - `endgame`: 終盤完全読みソルバーの契約とネイティブ実装、コスト推定
//! - `tt`: Alpha-Beta 探索専用の置換表
//! - `search`: Alpha-Beta ソルバー、確率的グラフ探索（PositionGraph / SearchDriver）

pub mod board;
pub mod endgame;
pub mod eval;
pub mod search;
pub mod stability;
pub mod tt;
pub mod types;

pub use board::{Position, PositionParseError, Symmetry};
pub use search::{
    AlphaBetaSolver, DriverState, SearchDriver, SearchError, SearchParams, SearchReport,
};
pub use types::{Move, Score};
