//! 着手

use std::fmt;

/// 着手（0..64 のマス番号、またはパス）
///
/// マス番号は `row * 8 + col`（a1 = 0, h1 = 7, a8 = 56, h8 = 63）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Move(u8);

impl Move {
    /// パス
    pub const PASS: Move = Move(64);
    /// 無効手（置換表の未設定ヒント等）
    pub const NONE: Move = Move(65);

    /// マス番号から生成
    #[inline]
    pub const fn from_square(square: u32) -> Move {
        debug_assert!(square < 64);
        Move(square as u8)
    }

    /// マス番号（パス・無効手は `None`）
    #[inline]
    pub const fn square(self) -> Option<u32> {
        if self.0 < 64 { Some(self.0 as u32) } else { None }
    }

    /// マスのビット（パス・無効手は 0）
    #[inline]
    pub const fn bit(self) -> u64 {
        if self.0 < 64 { 1u64 << self.0 } else { 0 }
    }

    #[inline]
    pub const fn is_pass(self) -> bool {
        self.0 == Self::PASS.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    /// "d3" 形式の文字列から生成（"pass" も受け付ける）
    pub fn from_text(text: &str) -> Option<Move> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("pass") || text == "--" {
            return Some(Move::PASS);
        }
        let bytes = text.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let col = bytes[0].to_ascii_lowercase().checked_sub(b'a')?;
        let row = bytes[1].checked_sub(b'1')?;
        if col >= 8 || row >= 8 {
            return None;
        }
        Some(Move::from_square(u32::from(row) * 8 + u32::from(col)))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.square() {
            Some(sq) => {
                let col = (b'a' + (sq % 8) as u8) as char;
                let row = (b'1' + (sq / 8) as u8) as char;
                write!(f, "{col}{row}")
            }
            None if self.is_pass() => f.write_str("pass"),
            None => f.write_str("none"),
        }
    }
}
