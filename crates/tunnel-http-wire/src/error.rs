#[derive(Debug, thiserror::Error)]
pub enum HttpWireError {
    #[error("malformed HTTP head: {0}")]
    Malformed(#[from] httparse::Error),
    #[error("HTTP head exceeded the {0} byte parse limit")]
    HeadTooLarge(usize),
    #[error("missing request line")]
    MissingRequestLine,
    #[error("missing status line")]
    MissingStatusLine,
}
