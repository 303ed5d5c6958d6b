pub type SlideResult<T> = Result<T, SlideError>;

/// Pipeline stage an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    ImageFetch,
    Render,
    Probe,
    Encode,
    Storage,
}

#[derive(thiserror::Error, Debug)]
pub enum SlideError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("asset fetch error for '{reference}': {reason}")]
    AssetFetch { reference: String, reason: String },

    #[error("count mismatch: {slides} slides but {audio_tracks} audio tracks")]
    CountMismatch { slides: usize, audio_tracks: usize },

    #[error("render error: {0}")]
    Render(String),

    #[error("probe error: {0}")]
    Probe(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("slide {index}: {source}")]
    Slide {
        index: usize,
        #[source]
        source: Box<SlideError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SlideError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset_fetch(reference: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::AssetFetch {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Attach the index of the slide being processed. Already-attributed errors keep
    /// their original index.
    pub fn for_slide(self, index: usize) -> Self {
        match self {
            Self::Slide { .. } | Self::Cancelled | Self::CountMismatch { .. } => self,
            other => Self::Slide {
                index,
                source: Box::new(other),
            },
        }
    }

    pub fn slide_index(&self) -> Option<usize> {
        match self {
            Self::Slide { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Parse(_) | Self::Validation(_) | Self::CountMismatch { .. } => Stage::Input,
            Self::AssetFetch { .. } => Stage::ImageFetch,
            Self::Render(_) => Stage::Render,
            Self::Probe(_) => Stage::Probe,
            Self::Encode(_) | Self::Cancelled => Stage::Encode,
            Self::NotFound(_) | Self::Other(_) => Stage::Storage,
            Self::Slide { source, .. } => source.stage(),
        }
    }

    /// True when the caller supplied bad input; such errors map to 4xx responses.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Parse(_)
            | Self::Validation(_)
            | Self::CountMismatch { .. }
            | Self::NotFound(_) => true,
            Self::Slide { source, .. } => source.is_client_error(),
            _ => false,
        }
    }

    /// HTTP status a request boundary should report for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::CountMismatch { .. } => 422,
            Self::Cancelled => 499,
            Self::Slide { source, .. } => source.status_code(),
            _ if self.is_client_error() => 400,
            Self::AssetFetch { .. } => 502,
            _ => 500,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            stage: self.stage(),
            slide_index: self.slide_index(),
            status: self.status_code(),
            message: self.to_string(),
        }
    }
}

/// Serializable error payload for request boundaries.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ErrorReport {
    pub stage: Stage,
    pub slide_index: Option<usize>,
    pub status: u16,
    pub message: String,
}
