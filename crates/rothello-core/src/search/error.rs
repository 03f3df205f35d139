//! 探索エラー

use thiserror::Error;

/// 探索を打ち切る致命的なエラー
///
/// 予算切れやグラフ・置換表の満杯はエラーではなく、ドライバの状態として扱う。
#[derive(Debug, Error)]
pub enum SearchError {
    /// グラフ構造・所有カウンタなどの整合性違反
    #[error("search invariant violated: {0}")]
    Invariant(String),

    /// ワーカースレッドが panic した
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    /// ワーカースレッドがエラーで終了した
    #[error("worker {worker} failed: {source}")]
    WorkerFailed {
        worker: usize,
        #[source]
        source: Box<SearchError>,
    },
}

impl SearchError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        SearchError::Invariant(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SearchError::invariant("threads_working underflow at node 3");
        assert_eq!(err.to_string(), "search invariant violated: threads_working underflow at node 3");

        let wrapped = SearchError::WorkerFailed { worker: 2, source: Box::new(err) };
        assert!(wrapped.to_string().starts_with("worker 2 failed: "));
        assert!(std::error::Error::source(&wrapped).is_some());
    }
}
