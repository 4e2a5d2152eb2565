use serde::{Deserialize, Serialize};

/// Separator between the crop type and the free-form comment in the stored
/// `crop` string.
pub const CROP_SEPARATOR: &str = " - ";

/// Crop type plus optional comment, stored remotely as a single string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CropLabel {
    pub crop: String,
    pub comment: String,
}

impl CropLabel {
    pub fn new(crop: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            crop: crop.into(),
            comment: comment.into(),
        }
    }

    /// Split on the first separator; everything after it is the comment.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        // Comment without a crop, as written by `combine` and then trimmed.
        if let Some(comment) = raw.strip_prefix(CROP_SEPARATOR.trim_start()) {
            return Self::new("", comment.trim());
        }
        match raw.split_once(CROP_SEPARATOR) {
            Some((crop, comment)) => Self::new(crop.trim(), comment.trim()),
            None => Self::new(raw.trim(), ""),
        }
    }

    pub fn combine(&self) -> String {
        let crop = self.crop.trim();
        let comment = self.comment.trim();
        match (crop.is_empty(), comment.is_empty()) {
            (_, true) => crop.to_string(),
            (true, false) => format!("{}{comment}", CROP_SEPARATOR.trim_start()),
            (false, false) => format!("{crop}{CROP_SEPARATOR}{comment}"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.crop.trim().is_empty() && self.comment.trim().is_empty()
    }
}
