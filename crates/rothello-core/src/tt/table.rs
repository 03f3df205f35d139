//! TranspositionTable本体
//!
//! - バケット: 局面ハッシュで決まるエントリのグループ（個別の Mutex で保護）
//! - probe/update操作
//! - 使用率がしきい値を超えたら全体をクリア

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::debug;
use parking_lot::Mutex;

use super::entry::{ProbeResult, TTEntry};
use super::BUCKET_SIZE;
use crate::board::Position;
use crate::types::{Move, Score};

type Bucket = [Option<TTEntry>; BUCKET_SIZE];

/// 置換表
pub struct TranspositionTable {
    /// バケットの配列
    buckets: Box<[Mutex<Bucket>]>,
    /// 使用中エントリ数（クリアと並行する書き込みがあるため概数）
    occupied: AtomicUsize,
    /// この数を超えたら全体をクリアする
    max_occupied: usize,
    /// クリア中フラグ（複数スレッドが同時にクリアしないように）
    clearing: AtomicBool,
}

impl TranspositionTable {
    /// 新しい置換表を作成（サイズはMB単位）
    pub fn new(mb_size: usize, fill_threshold: f64) -> Self {
        let bucket_bytes = std::mem::size_of::<Mutex<Bucket>>();
        let bucket_count = (mb_size * 1024 * 1024 / bucket_bytes).max(2);
        Self::with_buckets(bucket_count, fill_threshold)
    }

    /// バケット数を指定して作成
    pub fn with_buckets(bucket_count: usize, fill_threshold: f64) -> Self {
        let bucket_count = bucket_count.max(2);
        let buckets: Box<[Mutex<Bucket>]> =
            (0..bucket_count).map(|_| Mutex::new([None; BUCKET_SIZE])).collect();
        let capacity = bucket_count * BUCKET_SIZE;
        let max_occupied = ((capacity as f64) * fill_threshold.clamp(0.0, 1.0)) as usize;
        Self {
            buckets,
            occupied: AtomicUsize::new(0),
            max_occupied: max_occupied.max(1),
            clearing: AtomicBool::new(false),
        }
    }

    /// 総エントリ数
    pub fn capacity(&self) -> usize {
        self.buckets.len() * BUCKET_SIZE
    }

    /// 使用中エントリ数
    pub fn len(&self) -> usize {
        self.occupied.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 使用率（0.0..=1.0）
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64
    }

    /// バケットインデックスを計算
    #[inline]
    fn bucket_index(&self, key: u64) -> usize {
        // key * bucket_count / 2^64 でインデックスを計算
        ((key as u128 * self.buckets.len() as u128) >> 64) as usize
    }

    #[inline]
    fn bucket(&self, pos: &Position) -> &Mutex<Bucket> {
        &self.buckets[self.bucket_index(pos.hash_key())]
    }

    /// 置換表を検索
    ///
    /// 深さ `depth` 以上の探索で得られた境界のみを返す。エントリがなければ `None`。
    pub fn probe(&self, pos: &Position, depth: u8) -> Option<ProbeResult> {
        let bucket = self.bucket(pos).lock();
        bucket.iter().flatten().find(|e| e.key == *pos).map(|e| e.probe(depth))
    }

    /// 探索結果を書き込む
    ///
    /// `value` は窓 `(alpha, beta)` での fail-soft 探索結果。
    pub fn update(
        &self,
        pos: &Position,
        depth: u8,
        alpha: Score,
        beta: Score,
        value: Score,
        best_move: Move,
    ) {
        let inserted = {
            let mut bucket = self.bucket(pos).lock();
            if let Some(entry) = bucket.iter_mut().flatten().find(|e| e.key == *pos) {
                entry.update(depth, alpha, beta, value, best_move);
                false
            } else {
                let mut fresh = TTEntry::new(*pos);
                fresh.update(depth, alpha, beta, value, best_move);
                if let Some(slot) = bucket.iter_mut().find(|slot| slot.is_none()) {
                    *slot = Some(fresh);
                    true
                } else {
                    // 価値が最小のエントリを置換
                    let victim = bucket
                        .iter_mut()
                        .min_by_key(|slot| slot.as_ref().map_or(0, TTEntry::worth));
                    if let Some(slot) = victim {
                        *slot = Some(fresh);
                    }
                    false
                }
            }
        };

        if inserted && self.occupied.fetch_add(1, Ordering::Relaxed) + 1 > self.max_occupied {
            debug!(
                "transposition table over fill threshold ({} / {}), clearing",
                self.len(),
                self.capacity()
            );
            self.clear();
        }
    }

    /// クリア
    ///
    /// 他スレッドがクリア中なら何もしない。
    pub fn clear(&self) {
        if self
            .clearing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        for bucket in self.buckets.iter() {
            *bucket.lock() = [None; BUCKET_SIZE];
        }
        self.occupied.store(0, Ordering::Relaxed);
        self.clearing.store(false, Ordering::Release);
    }
}
