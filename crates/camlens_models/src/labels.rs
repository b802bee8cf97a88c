//! Chest X-ray pathology labels.

/// The 18 pathology labels scored by the chest X-ray classifier, in output order.
pub const PATHOLOGIES: [&str; 18] = [
    "Atelectasis",
    "Consolidation",
    "Infiltration",
    "Pneumothorax",
    "Edema",
    "Emphysema",
    "Fibrosis",
    "Effusion",
    "Pneumonia",
    "Pleural_Thickening",
    "Cardiomegaly",
    "Nodule",
    "Mass",
    "Hernia",
    "Lung Lesion",
    "Fracture",
    "Lung Opacity",
    "Enlarged Cardiomediastinum",
];

/// Owned copy of [`PATHOLOGIES`].
pub fn pathology_labels() -> Vec<String> {
    PATHOLOGIES.iter().map(|s| s.to_string()).collect()
}

/// Index of `label` in [`PATHOLOGIES`], ignoring case.
pub fn pathology_index(label: &str) -> Option<usize> {
    PATHOLOGIES
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(label))
}
