use thiserror::Error;

/// Failures raised by the extraction engine.
///
/// Everything except `Cancelled` and `NoCards` is scoped to a single file and
/// names it, so the batch can report it and move on.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("the analysis was cancelled")]
    Cancelled,

    #[error("{file}: line {line}: expected 3 fields (tag|nationality|name), found {found}")]
    MalformedIndex {
        file: String,
        line: usize,
        found: usize,
    },

    #[error("{file}: found {records} card records but {images} card images")]
    CountMismatch {
        file: String,
        records: usize,
        images: usize,
    },

    #[error("{file}: text layout extraction failed: {reason:#}")]
    Decoder { file: String, reason: anyhow::Error },

    #[error("{file}: page rendering failed: {reason:#}")]
    Rasterizer { file: String, reason: anyhow::Error },

    #[error("{file}: failed to process page image {page}: {source}")]
    Image {
        file: String,
        page: String,
        #[source]
        source: image::ImageError,
    },

    #[error("{file}: {context}: {source}")]
    Io {
        file: String,
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no cards were found")]
    NoCards,
}

impl ExtractError {
    pub(crate) fn io(file: &str, context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            file: file.to_string(),
            context: context.into(),
            source,
        }
    }
}
