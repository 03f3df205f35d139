//! 局面

use std::fmt;

use super::bitboard::{flips, legal_moves, squares};
use crate::types::{EVAL_SCALE, Move, Score};

/// 局面
///
/// 手番側（`player`）と相手側（`opponent`）の石の位置を表す、互いに素な2枚のビットボード。
/// 同一性はビットボードの完全一致で判定し、回転・鏡映による同一視は行わない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    player: u64,
    opponent: u64,
}

/// テキスト局面の解析エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionParseError {
    #[error("board must have 64 squares, found {0}")]
    WrongLength(usize),
    #[error("unexpected character {0:?} in board")]
    UnexpectedChar(char),
    #[error("invalid side-to-move marker {0:?}")]
    InvalidSideToMove(String),
}

impl Position {
    /// 2枚のビットボードから生成
    #[inline]
    pub const fn new(player: u64, opponent: u64) -> Position {
        debug_assert!(player & opponent == 0);
        Position { player, opponent }
    }

    /// 初期局面（黒番: d5, e4 が黒、d4, e5 が白）
    pub const fn initial() -> Position {
        Position::new((1 << 28) | (1 << 35), (1 << 27) | (1 << 36))
    }

    #[inline]
    pub const fn player(&self) -> u64 {
        self.player
    }

    #[inline]
    pub const fn opponent(&self) -> u64 {
        self.opponent
    }

    /// 空きマス
    #[inline]
    pub const fn empties(&self) -> u64 {
        !(self.player | self.opponent)
    }

    /// 空きマス数
    #[inline]
    pub const fn empty_count(&self) -> u32 {
        self.empties().count_ones()
    }

    /// 手番側の合法手
    #[inline]
    pub fn legal_moves(&self) -> u64 {
        legal_moves(self.player, self.opponent)
    }

    /// 相手側の合法手（パス判定用）
    #[inline]
    pub fn opponent_moves(&self) -> u64 {
        legal_moves(self.opponent, self.player)
    }

    /// 手番側の着手可能数
    #[inline]
    pub fn mobility(&self) -> u32 {
        self.legal_moves().count_ones()
    }

    /// `square` への着手で裏返る石
    #[inline]
    pub fn flips(&self, square: u32) -> u64 {
        flips(self.player, self.opponent, square)
    }

    /// 裏返しマスクが既知の着手を適用し、手番を入れ替えた局面を返す
    #[inline]
    pub fn play_with_flips(&self, square: u32, flipped: u64) -> Position {
        debug_assert!(flipped != 0);
        let placed = 1u64 << square;
        Position::new(self.opponent ^ flipped, self.player | flipped | placed)
    }

    /// 着手を適用（非合法手なら `None`）
    pub fn play(&self, mv: Move) -> Option<Position> {
        if mv.is_pass() {
            return (self.legal_moves() == 0 && !self.is_game_over()).then(|| self.pass());
        }
        let square = mv.square()?;
        if self.empties() & (1u64 << square) == 0 {
            return None;
        }
        let flipped = self.flips(square);
        (flipped != 0).then(|| self.play_with_flips(square, flipped))
    }

    /// パス（手番のみ入れ替え）
    #[inline]
    pub const fn pass(&self) -> Position {
        Position::new(self.opponent, self.player)
    }

    /// 両者とも合法手がなく終局しているか
    #[inline]
    pub fn is_game_over(&self) -> bool {
        self.legal_moves() == 0 && self.opponent_moves() == 0
    }

    /// 手番側から見た石差（空きマスは数えない）
    #[inline]
    pub const fn disk_difference(&self) -> i32 {
        self.player.count_ones() as i32 - self.opponent.count_ones() as i32
    }

    /// 終局スコア（空きマスは勝者に加算）
    pub const fn final_score(&self) -> Score {
        let diff = self.disk_difference();
        let empties = self.empty_count() as i32;
        let disks = if diff > 0 {
            diff + empties
        } else if diff < 0 {
            diff - empties
        } else {
            0
        };
        disks * EVAL_SCALE
    }

    /// 合法手と裏返しマスクの列挙
    pub fn moves(&self) -> MoveIter {
        MoveIter {
            position: *self,
            remaining: self.legal_moves(),
        }
    }

    /// 2枚のビットボードの乗算ハッシュ
    #[inline]
    pub const fn hash_key(&self) -> u64 {
        let h = self.player.wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ self.opponent.rotate_left(31).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        h ^ (h >> 29)
    }

    /// テキストから生成
    ///
    /// 64文字の盤面（`X`/`x`/`*` = 手番側, `O`/`o` = 相手側, `-`/`.` = 空き、空白は無視）。
    /// 盤面の後ろに手番記号（`X` または `O`）を置いた場合、`O` ならビットボードを入れ替える。
    pub fn from_text(text: &str) -> Result<Position, PositionParseError> {
        let mut chars = text.chars().filter(|c| !c.is_whitespace());
        let mut player = 0u64;
        let mut opponent = 0u64;
        let mut count = 0usize;
        for c in chars.by_ref().take(64) {
            let bit = 1u64 << count;
            match c {
                'X' | 'x' | '*' => player |= bit,
                'O' | 'o' => opponent |= bit,
                '-' | '.' => {}
                other => return Err(PositionParseError::UnexpectedChar(other)),
            }
            count += 1;
        }
        if count != 64 {
            return Err(PositionParseError::WrongLength(count));
        }
        let rest: String = chars.collect();
        match rest.as_str() {
            "" | "X" | "x" | "*" => Ok(Position::new(player, opponent)),
            "O" | "o" => Ok(Position::new(opponent, player)),
            other => Err(PositionParseError::InvalidSideToMove(other.to_string())),
        }
    }

    /// 8行の盤面表示（デバッグ用）
    pub fn to_board_string(&self) -> String {
        let mut out = String::with_capacity(8 * 10);
        for row in 0..8 {
            for col in 0..8 {
                out.push(self.square_char(row * 8 + col));
            }
            out.push('\n');
        }
        out
    }

    #[inline]
    fn square_char(&self, square: u32) -> char {
        let bit = 1u64 << square;
        if self.player & bit != 0 {
            'X'
        } else if self.opponent & bit != 0 {
            'O'
        } else {
            '-'
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::initial()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for square in 0..64 {
            write!(f, "{}", self.square_char(square))?;
        }
        Ok(())
    }
}

/// 合法手 `(Move, 裏返しマスク)` の列挙子
pub struct MoveIter {
    position: Position,
    remaining: u64,
}

impl Iterator for MoveIter {
    type Item = (Move, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let square = squares(self.remaining).next()?;
        self.remaining &= self.remaining - 1;
        Some((Move::from_square(square), self.position.flips(square)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for MoveIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_position() {
        let pos = Position::initial();
        assert_eq!(pos.empty_count(), 60);
        assert_eq!(pos.mobility(), 4);
        assert_eq!(pos.disk_difference(), 0);
        assert!(!pos.is_game_over());
    }

    #[test]
    fn test_play_swaps_sides() {
        let pos = Position::initial();
        let next = pos.play(Move::from_text("d3").unwrap()).unwrap();
        assert_eq!(next.empty_count(), 59);
        // 着手後は相手番なので、相手側（直前の手番）が4石
        assert_eq!(next.opponent().count_ones(), 4);
        assert_eq!(next.player().count_ones(), 1);
        assert_eq!(pos.play(Move::from_square(0)), None);
        assert_eq!(pos.play(Move::PASS), None);
    }

    #[test]
    fn test_final_score_gives_empties_to_winner() {
        // 手番側 3石、相手 1石、空き 60
        let pos = Position::new(0b111, 1 << 63);
        assert_eq!(pos.final_score(), (2 + 60) * EVAL_SCALE);
        assert_eq!(pos.pass().final_score(), -(2 + 60) * EVAL_SCALE);
        let draw = Position::new(1, 1 << 63);
        assert_eq!(draw.final_score(), 0);
    }

    #[test]
    fn test_text_roundtrip_and_side_marker() {
        let pos = Position::initial();
        let text = pos.to_string();
        assert_eq!(Position::from_text(&text).unwrap(), pos);
        let swapped = Position::from_text(&format!("{text} O")).unwrap();
        assert_eq!(swapped, pos.pass());
    }

    #[test]
    fn test_text_errors() {
        assert_eq!(Position::from_text("XO"), Err(PositionParseError::WrongLength(2)));
        let bad = "Z".repeat(64);
        assert_eq!(Position::from_text(&bad), Err(PositionParseError::UnexpectedChar('Z')));
        let board = "-".repeat(64);
        assert!(matches!(
            Position::from_text(&format!("{board} Q")),
            Err(PositionParseError::InvalidSideToMove(_))
        ));
    }

    #[test]
    fn test_moves_iter_matches_legal_moves() {
        let pos = Position::initial();
        let moves: Vec<_> = pos.moves().collect();
        assert_eq!(moves.len(), 4);
        for (mv, flipped) in moves {
            assert_ne!(flipped, 0);
            assert_ne!(pos.legal_moves() & mv.bit(), 0);
        }
    }

    #[test]
    fn test_hash_key_distinguishes_side_to_move() {
        let pos = Position::initial();
        assert_ne!(pos.hash_key(), pos.pass().hash_key());
    }
}
