use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::DecisionMode,
    error::{ConsensusError, Result},
    types::{field_to_binary, field_to_luma8, to_binary, ConsensusLabel, MaskStack, PixelSize, ProbabilityField},
};

/// Sidecar written next to every persisted label image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMetadata {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixel_size: PixelSize,
    pub border_width: u32,
    pub mode: DecisionMode,
}

/// A label read back from disk. Only the boundary is persisted.
#[derive(Debug, Clone)]
pub struct StoredLabel {
    pub metadata: LabelMetadata,
    pub boundary: ProbabilityField,
}

impl StoredLabel {
    /// Load `<name>.png` and its `<name>.json` sidecar.
    pub fn load(image_path: impl AsRef<Path>) -> Result<Self> {
        let image_path = image_path.as_ref();
        let sidecar = std::fs::read_to_string(image_path.with_extension("json"))?;
        let metadata: LabelMetadata = serde_json::from_str(&sidecar)?;

        let image = image::open(image_path)?.to_luma8();
        if image.dimensions() != (metadata.width, metadata.height) {
            return Err(ConsensusError::DimensionMismatch {
                expected: (metadata.width, metadata.height),
                found: image.dimensions(),
            });
        }

        let boundary = ProbabilityField::from_fn(image.width(), image.height(), |x, y| {
            Luma([image.get_pixel(x, y)[0] as f32 / 255.0])
        });
        Ok(Self { metadata, boundary })
    }

    /// Boundary label binarized at half coverage
    pub fn boundary_mask(&self) -> GrayImage {
        field_to_binary(&self.boundary, 0.5)
    }
}

impl ConsensusLabel {
    pub fn metadata(&self) -> LabelMetadata {
        LabelMetadata {
            name: self.name.clone(),
            width: self.width(),
            height: self.height(),
            pixel_size: self.pixel_size.clone(),
            border_width: self.border_width,
            mode: self.mode,
        }
    }

    /// Write the boundary as an 8-bit `<name>.png` in `dir`, with a JSON
    /// sidecar holding the physical pixel size. Returns the image path.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let image_path = dir.join(format!("{}.png", self.name));
        field_to_luma8(&self.boundary).save(&image_path)?;
        std::fs::write(
            image_path.with_extension("json"),
            serde_json::to_string_pretty(&self.metadata())?,
        )?;

        debug!(path = %image_path.display(), "saved consensus label");
        Ok(image_path)
    }
}

/// Load an 8-bit image as a binary mask, thresholded at 128.
pub fn load_mask(path: impl AsRef<Path>) -> Result<GrayImage> {
    Ok(to_binary(&image::open(path)?.to_luma8()))
}

/// Load a stack of binary masks, one image per slice, in the given order.
pub fn load_mask_stack<P: AsRef<Path>>(paths: &[P]) -> Result<MaskStack> {
    let slices = paths.iter().map(load_mask).collect::<Result<Vec<_>>>()?;
    if let Some(first) = slices.first() {
        if let Some(other) = slices.iter().find(|s| s.dimensions() != first.dimensions()) {
            return Err(ConsensusError::DimensionMismatch {
                expected: first.dimensions(),
                found: other.dimensions(),
            });
        }
    }
    Ok(MaskStack::new(slices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FOREGROUND;

    fn label() -> ConsensusLabel {
        let mut boundary = ProbabilityField::new(8, 6);
        boundary.put_pixel(2, 3, Luma([1.0]));
        boundary.put_pixel(3, 3, Luma([0.4]));
        ConsensusLabel {
            name: "slice_001".to_string(),
            probability: boundary.clone(),
            interior: GrayImage::new(8, 6),
            boundary,
            border_width: 2,
            mode: DecisionMode::Sigmoid,
            pixel_size: PixelSize {
                xy: 0.0125,
                z: 0.05,
                unit: "micron".to_string(),
            },
        }
    }

    #[test]
    fn test_save_and_load_label() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let label = label();

        let path = label.save(dir.path().join("labels")).expect("Should save");
        assert!(path.with_extension("json").exists());

        let stored = StoredLabel::load(&path).expect("Should load");
        assert_eq!(stored.metadata, label.metadata());
        assert_eq!(stored.boundary.get_pixel(2, 3)[0], 1.0);
        assert!((stored.boundary.get_pixel(3, 3)[0] - 0.4).abs() < 1.0 / 255.0);

        let mask = stored.boundary_mask();
        assert_eq!(mask.get_pixel(2, 3)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(3, 3)[0], 0);
    }

    #[test]
    fn test_mask_stack_rejects_mixed_sizes() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        GrayImage::new(4, 4).save(&a).expect("Should save");
        GrayImage::new(5, 4).save(&b).expect("Should save");

        assert_eq!(load_mask_stack(&[&a]).expect("Should load").depth(), 1);
        assert!(matches!(
            load_mask_stack(&[&a, &b]),
            Err(ConsensusError::DimensionMismatch { .. })
        ));
    }
}
