use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Malformed annotation: {0}")]
    MalformedAnnotation(String),

    #[error("No annotators contributed to this slice")]
    MissingConsensus,

    #[error("Empty metric domain: {0}")]
    EmptyMetricDomain(String),

    #[error("Dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Image error: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

impl ConsensusError {
    /// Whether the failure means "no data" rather than "bad data".
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::MissingConsensus)
    }
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
