#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cache entry for the advertised baseline digest")]
    BaselineMissing,
    #[error("binary delta failure: {0}")]
    Delta(#[from] std::io::Error),
}
