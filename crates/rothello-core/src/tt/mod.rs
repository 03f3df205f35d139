//! 置換表モジュール
//!
//! Alpha-Beta ソルバー専用の境界キャッシュ。
//!
//! - `TTEntry`: 局面ごとの下界・上界（それぞれの探索深さ付き）と最善手・次善手
//! - `TranspositionTable`: バケット単位のロックを持つテーブル本体
//!
//! バケットは局面ハッシュで決まり、無関係な局面は別のロックを取る。
//! 使用率がしきい値を超えたらテーブル全体をまとめて解放する。

mod entry;
mod table;

pub use entry::{ProbeResult, TTEntry};
pub use table::TranspositionTable;

/// バケットあたりのエントリ数
pub const BUCKET_SIZE: usize = 4;

/// 「終局まで読み切った」ことを表す深さ。どの深さ要求も満たす。
pub const EXACT_DEPTH: u8 = 64;
