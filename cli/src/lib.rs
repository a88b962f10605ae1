use consensus::{
    config::{border_width_px, corrected_zoom},
    Annotation, ConsensusConfig, ConsensusError, PixelSize, SliceAnnotations,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
    #[error("Missing 'border_width_px', or 'border_width_nm' with 'pixel_size_nm'")]
    MissingBorderWidth,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

fn default_zoom() -> f32 {
    1.0
}

/// One slice of an aggregation job
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SliceEntry {
    /// Output label name, without extension
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// JSON file holding one entry per annotator, each a list of strokes,
    /// each a list of `[x, y]` points. Relative to the job file.
    pub annotations: String,
}

/// Consensus label job configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AggregationJob {
    pub output_dir: String,
    /// Boundary width in pixels; takes precedence over `border_width_nm`
    pub border_width_px: Option<u32>,
    /// Physical boundary width, converted with `pixel_size_nm`
    pub border_width_nm: Option<f64>,
    /// XY pixel pitch in nanometres
    pub pixel_size_nm: Option<f64>,
    /// Slice spacing in nanometres, defaults to the XY pitch
    pub z_spacing_nm: Option<f64>,
    /// Zoom the annotations were drawn at relative to the slice raster
    #[serde(default = "default_zoom")]
    pub zoom: f32,
    /// Nominal raster size the zoom refers to; slices of another size get
    /// a per-axis corrected zoom
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    /// Also write the consensus contours of every slice as GeoJSON
    #[serde(default)]
    pub export_contours: bool,
    pub slices: Vec<SliceEntry>,
}

impl AggregationJob {
    /// Load AggregationJob configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load AggregationJob configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, JobError> {
        Ok(toml::from_str(content)?)
    }

    /// Load AggregationJob configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load AggregationJob configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(JobError::UnsupportedFileFormat),
        }
    }

    /// Convert AggregationJob to TOML string
    pub fn to_toml(&self) -> Result<String, JobError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert AggregationJob to JSON string
    pub fn to_json(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Rendered boundary width in pixels
    pub fn border_width(&self) -> Result<u32, JobError> {
        match (self.border_width_px, self.border_width_nm, self.pixel_size_nm) {
            (Some(px), _, _) => Ok(px.max(1)),
            (None, Some(nm), Some(pixel_nm)) => Ok(border_width_px(nm, pixel_nm)?),
            _ => Err(JobError::MissingBorderWidth),
        }
    }

    /// Pixel size recorded on the labels, in nanometres when known
    pub fn pixel_size(&self) -> PixelSize {
        match self.pixel_size_nm {
            Some(xy) => PixelSize {
                xy,
                z: self.z_spacing_nm.unwrap_or(xy),
                unit: "nm".to_string(),
            },
            None => PixelSize::default(),
        }
    }

    /// Per-axis zoom for a slice of the given raster size
    pub fn zoom_for(&self, width: u32, height: u32) -> (f32, f32) {
        match (self.target_width, self.target_height) {
            (Some(tw), Some(th)) => corrected_zoom(self.zoom, (width, height), (tw, th)),
            _ => (self.zoom, self.zoom),
        }
    }

    /// Read a slice's annotation file and scale it onto the slice raster.
    /// Relative annotation paths are resolved against `base_dir`.
    pub fn load_slice(&self, entry: &SliceEntry, base_dir: &Path) -> Result<SliceAnnotations, JobError> {
        let content = fs::read_to_string(base_dir.join(&entry.annotations))?;
        let raw: Vec<Annotation> = serde_json::from_str(&content)?;
        let (zoom_x, zoom_y) = self.zoom_for(entry.width, entry.height);

        Ok(SliceAnnotations {
            name: entry.name.clone(),
            width: entry.width,
            height: entry.height,
            annotations: raw.iter().map(|a| a.scaled(zoom_x, zoom_y)).collect(),
        })
    }
}
