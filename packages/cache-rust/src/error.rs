//! Error types for the row cache.

use std::fmt;

/// Which backing-store query failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Count,
    IdList,
    Page,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryKind::Count => "count",
            QueryKind::IdList => "id list",
            QueryKind::Page => "page",
        })
    }
}

/// Errors surfaced by the cache.
///
/// `QueryExecution` never reaches `row_at`/`row_count` callers: the workers
/// log it and substitute an empty result. It exists so the log line carries
/// a typed cause.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("{query} query failed: {source}")]
    QueryExecution {
        query: QueryKind,
        #[source]
        source: anyhow::Error,
    },
    #[error("{worker} worker is not running")]
    WorkerStopped { worker: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_part() {
        let err = CacheError::QueryExecution {
            query: QueryKind::Page,
            source: anyhow::anyhow!("disk I/O error"),
        };
        assert_eq!(err.to_string(), "page query failed: disk I/O error");

        let err = CacheError::WorkerStopped { worker: "id-scan" };
        assert_eq!(err.to_string(), "id-scan worker is not running");
    }
}
