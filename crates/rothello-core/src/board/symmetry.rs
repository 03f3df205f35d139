//! 盤面の対称変換（二面体群 D4 の8要素）
//!
//! 探索グラフでは対称局面を同一視しない。対称性は検証用途（評価の対称不変性）で使う。

use super::position::Position;

/// 8つの対称変換
///
/// 内部表現は3ビット: bit0 = 上下反転, bit1 = 左右反転, bit2 = a1-h8 対角反転。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symmetry(u8);

impl Symmetry {
    pub const IDENTITY: Symmetry = Symmetry(0);

    /// 全8変換
    pub const ALL: [Symmetry; 8] = [
        Symmetry(0),
        Symmetry(1),
        Symmetry(2),
        Symmetry(3),
        Symmetry(4),
        Symmetry(5),
        Symmetry(6),
        Symmetry(7),
    ];

    /// ビットボードに変換を適用
    pub const fn apply(self, mut bb: u64) -> u64 {
        if self.0 & 1 != 0 {
            bb = flip_vertical(bb);
        }
        if self.0 & 2 != 0 {
            bb = mirror_horizontal(bb);
        }
        if self.0 & 4 != 0 {
            bb = flip_diag_a1h8(bb);
        }
        bb
    }
}

/// 上下反転（1段目 ↔ 8段目）
#[inline]
const fn flip_vertical(bb: u64) -> u64 {
    bb.swap_bytes()
}

/// 左右反転（a列 ↔ h列）
#[inline]
const fn mirror_horizontal(mut bb: u64) -> u64 {
    const K1: u64 = 0x5555_5555_5555_5555;
    const K2: u64 = 0x3333_3333_3333_3333;
    const K4: u64 = 0x0f0f_0f0f_0f0f_0f0f;
    bb = ((bb >> 1) & K1) | ((bb & K1) << 1);
    bb = ((bb >> 2) & K2) | ((bb & K2) << 2);
    ((bb >> 4) & K4) | ((bb & K4) << 4)
}

/// a1-h8 対角での反転（転置）
#[inline]
const fn flip_diag_a1h8(mut bb: u64) -> u64 {
    const K1: u64 = 0x5500_5500_5500_5500;
    const K2: u64 = 0x3333_0000_3333_0000;
    const K4: u64 = 0x0f0f_0f0f_0000_0000;
    let mut t = K4 & (bb ^ (bb << 28));
    bb ^= t ^ (t >> 28);
    t = K2 & (bb ^ (bb << 14));
    bb ^= t ^ (t >> 14);
    t = K1 & (bb ^ (bb << 7));
    bb ^= t ^ (t >> 7);
    bb
}

impl Position {
    /// 対称変換した局面
    pub const fn transform(&self, symmetry: Symmetry) -> Position {
        Position::new(symmetry.apply(self.player()), symmetry.apply(self.opponent()))
    }
}
