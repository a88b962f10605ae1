pub mod geojson;
pub mod label;

pub use geojson::ContourSet;
pub use label::{load_mask, load_mask_stack, LabelMetadata, StoredLabel};
