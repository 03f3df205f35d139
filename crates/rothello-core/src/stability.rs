//! 確定石（以後決して裏返らない石）の保守的な計算
//!
//! 4つの直線方向それぞれについて「その直線が埋まっている」「盤端で片側に隣接マスがない」
//! 「同じ色の確定石に隣接している」のいずれかを満たす石を確定石とし、不動点まで反復する。
//! 得られる集合は真の確定石の部分集合なので、そこから導く上界は常に正しい。

use std::sync::LazyLock;

use crate::board::Position;
use crate::board::squares;
use crate::types::{EVAL_SCALE, Score};

const RANK_1: u64 = 0x0000_0000_0000_00ff;
const RANK_8: u64 = 0xff00_0000_0000_0000;
const FILE_A: u64 = 0x0101_0101_0101_0101;
const FILE_H: u64 = 0x8080_8080_8080_8080;
const BORDER: u64 = RANK_1 | RANK_8 | FILE_A | FILE_H;

/// 方向ごとの直線マスク: [横, 縦, a1-h8 方向の斜め, a8-h1 方向の斜め]
static LINES: LazyLock<[[u64; 4]; 64]> = LazyLock::new(|| {
    let mut table = [[0u64; 4]; 64];
    for (sq, lines) in table.iter_mut().enumerate() {
        let row = (sq / 8) as i32;
        let col = (sq % 8) as i32;
        for r in 0..8i32 {
            for c in 0..8i32 {
                let bit = 1u64 << (r * 8 + c);
                if r == row {
                    lines[0] |= bit;
                }
                if c == col {
                    lines[1] |= bit;
                }
                if r - c == row - col {
                    lines[2] |= bit;
                }
                if r + c == row + col {
                    lines[3] |= bit;
                }
            }
        }
    }
    table
});

/// 埋まっている直線上のマスを方向ごとに返す
fn full_lines(occupied: u64) -> [u64; 4] {
    let mut full = [0u64; 4];
    for sq in squares(occupied) {
        let lines = &LINES[sq as usize];
        for (dir, line) in lines.iter().enumerate() {
            if occupied & line == *line {
                full[dir] |= 1u64 << sq;
            }
        }
    }
    full
}

/// `player` の確定石
pub fn stable_disks(player: u64, opponent: u64) -> u64 {
    let full = full_lines(player | opponent);
    let edge_h = FILE_A | FILE_H;
    let edge_v = RANK_1 | RANK_8;
    let mut stable = 0u64;
    loop {
        let horizontal = full[0] | edge_h | ((stable << 1) & !FILE_A) | ((stable >> 1) & !FILE_H);
        let vertical = full[1] | edge_v | (stable << 8) | (stable >> 8);
        let diag = full[2] | BORDER | ((stable << 9) & !FILE_A) | ((stable >> 9) & !FILE_H);
        let anti = full[3] | BORDER | ((stable << 7) & !FILE_H) | ((stable >> 7) & !FILE_A);
        let next = player & horizontal & vertical & diag & anti;
        if next == stable {
            return stable;
        }
        stable = next;
    }
}

/// 手番側が終局時に得られるスコアの上界
///
/// 相手の確定石は最後まで相手のものなので、手番側の石数は `64 - 相手確定石数` 以下になる。
pub fn stability_upper_bound(pos: &Position) -> Score {
    let stable_opponent = stable_disks(pos.opponent(), pos.player()).count_ones() as i32;
    (64 - 2 * stable_opponent) * EVAL_SCALE
}
