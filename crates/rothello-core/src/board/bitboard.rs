//! ビットボード演算
//!
//! 8方向のシフトと、それを用いた合法手生成・裏返し計算。

/// a 列を除くマスク（左シフトで h 列から a 列へ回り込んだビットを落とす）
pub(crate) const NOT_A_FILE: u64 = 0xfefe_fefe_fefe_fefe;
/// h 列を除くマスク
pub(crate) const NOT_H_FILE: u64 = 0x7f7f_7f7f_7f7f_7f7f;

/// 8方向（シフト量, シフト後のマスク）。正のシフトは左シフト。
pub(crate) const DIRECTIONS: [(i32, u64); 8] = [
    (1, NOT_A_FILE),  // 東
    (-1, NOT_H_FILE), // 西
    (8, u64::MAX),    // 北
    (-8, u64::MAX),   // 南
    (9, NOT_A_FILE),  // 北東
    (7, NOT_H_FILE),  // 北西
    (-7, NOT_A_FILE), // 南東
    (-9, NOT_H_FILE), // 南西
];

/// 1方向へ1マスずらす
#[inline(always)]
pub(crate) const fn shift(bb: u64, dir: (i32, u64)) -> u64 {
    let (amount, mask) = dir;
    if amount > 0 {
        (bb << amount) & mask
    } else {
        (bb >> -amount) & mask
    }
}

/// 合法手のビットマスク
///
/// `player` が着手でき、`opponent` の石を1つ以上挟めるマスの集合。
#[inline]
pub fn legal_moves(player: u64, opponent: u64) -> u64 {
    let empty = !(player | opponent);
    let mut moves = 0;
    for dir in DIRECTIONS {
        let mut x = shift(player, dir) & opponent;
        x |= shift(x, dir) & opponent;
        x |= shift(x, dir) & opponent;
        x |= shift(x, dir) & opponent;
        x |= shift(x, dir) & opponent;
        x |= shift(x, dir) & opponent;
        moves |= shift(x, dir) & empty;
    }
    moves
}

/// `square` に着手したときに裏返る石のマスク（非合法手なら 0）
#[inline]
pub fn flips(player: u64, opponent: u64, square: u32) -> u64 {
    let placed = 1u64 << square;
    let mut flipped = 0;
    for dir in DIRECTIONS {
        let mut line = 0;
        let mut x = shift(placed, dir);
        while x & opponent != 0 {
            line |= x;
            x = shift(x, dir);
        }
        if x & player != 0 {
            flipped |= line;
        }
    }
    flipped
}

/// ビットマスクのマス番号を昇順に列挙
#[inline]
pub fn squares(mut bb: u64) -> impl Iterator<Item = u32> {
    std::iter::from_fn(move || {
        if bb == 0 {
            None
        } else {
            let sq = bb.trailing_zeros();
            bb &= bb - 1;
            Some(sq)
        }
    })
}
