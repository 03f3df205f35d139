//! 統合テスト共通ヘルパー

#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rothello_core::Position;

/// ランダムな合法手で `empties` 空きの局面を作る（終局していない局面に限る）
pub fn random_position(seed: u64, empties: u32) -> Position {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    loop {
        let mut pos = Position::initial();
        while pos.empty_count() > empties && !pos.is_game_over() {
            let moves: Vec<_> = pos.moves().collect();
            if moves.is_empty() {
                pos = pos.pass();
                continue;
            }
            let (mv, flips) = moves[rng.random_range(0..moves.len())];
            pos = pos.play_with_flips(mv.square().unwrap(), flips);
        }
        if pos.empty_count() == empties && !pos.is_game_over() {
            return pos;
        }
    }
}
