//! 盤面モジュール
//!
//! - `Position`: 手番側・相手側の2枚のビットボードによる局面
//! - 合法手生成と裏返しマスクの計算
//! - 盤面の8対称変換
//!
//! ビット番号は `row * 8 + col`（a1 = bit 0, h8 = bit 63）。

mod bitboard;
mod position;
mod symmetry;

pub use bitboard::{flips, legal_moves, squares};
pub use position::{MoveIter, Position, PositionParseError};
pub use symmetry::Symmetry;
