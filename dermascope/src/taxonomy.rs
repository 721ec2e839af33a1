//! Lesion taxonomy for the HAM10000 dataset
//!
//! Fixed bidirectional mapping between class indices, human-readable lesion
//! names, and the short `dx` codes used by the dataset metadata file.
//! The classifier's output dimension must always match [`NUM_CLASSES`].

use crate::NUM_CLASSES;

/// Lesion class names - MUST match the label indices produced by the dataset
/// loader (order is the historical one shipped with the trained models).
pub const LESION_NAMES: [&str; NUM_CLASSES] = [
    "Melanocytic nevi",              // 0 (nv)
    "dermatofibroma",                // 1 (mel)
    "Benign keratosis-like lesions", // 2 (bkl)
    "Basal cell carcinoma",          // 3 (bcc)
    "Actinic keratoses",             // 4 (akiec)
    "Vascular lesions",              // 5 (vasc)
    "Dermatofibroma",                // 6 (df)
];

/// Short diagnosis codes from `HAM10000_metadata.csv`, index-aligned with
/// [`LESION_NAMES`].
pub const DX_CODES: [&str; NUM_CLASSES] = ["nv", "mel", "bkl", "bcc", "akiec", "vasc", "df"];

/// Bidirectional class index <-> label mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct LesionTaxonomy;

impl LesionTaxonomy {
    pub fn new() -> Self {
        Self
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        NUM_CLASSES
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Human-readable name for a class index.
    pub fn class_name(&self, index: usize) -> Option<&'static str> {
        LESION_NAMES.get(index).copied()
    }

    /// Class index for a human-readable name (case-sensitive).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        LESION_NAMES.iter().position(|&n| n == name)
    }

    /// Class index for a metadata `dx` code.
    pub fn index_of_code(&self, code: &str) -> Option<usize> {
        DX_CODES.iter().position(|&c| c == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_is_bijective() {
        let taxonomy = LesionTaxonomy::new();
        assert_eq!(taxonomy.len(), 7);

        for index in 0..taxonomy.len() {
            let name = taxonomy.class_name(index).unwrap();
            assert_eq!(taxonomy.index_of(name), Some(index));
        }
    }

    #[test]
    fn test_out_of_range_index() {
        let taxonomy = LesionTaxonomy::new();
        assert_eq!(taxonomy.class_name(7), None);
        assert_eq!(taxonomy.index_of("not a lesion"), None);
    }

    #[test]
    fn test_dx_codes_cover_all_classes() {
        let taxonomy = LesionTaxonomy::new();
        assert_eq!(taxonomy.index_of_code("nv"), Some(0));
        assert_eq!(taxonomy.index_of_code("df"), Some(6));
        assert_eq!(taxonomy.index_of_code("xyz"), None);

        for (index, code) in DX_CODES.iter().enumerate() {
            assert_eq!(taxonomy.index_of_code(code), Some(index));
        }
    }
}
