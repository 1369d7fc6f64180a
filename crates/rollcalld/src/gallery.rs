//! Gallery construction from collaborator-supplied enrollments.
//!
//! The recognition collaborator owns image decoding and embedding
//! extraction; this module owns the naming rule. An enrollment file name,
//! minus extension and minus any `_`-delimited suffix, is the canonical
//! identity name: `ALICE_1.jpg` and `ALICE_2.jpg` enroll two embeddings
//! for the single displayed identity `ALICE`.

use rollcall_core::{Embedding, KnownIdentity};
use serde::{Deserialize, Serialize};

/// One enrollment as handed over by the recognition collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    /// Enrollment file name, e.g. `ALICE_1.jpg`.
    pub file: String,
    /// Feature vector extracted from that photo. Empty when the
    /// collaborator found no usable face in it.
    pub embedding: Vec<f32>,
}

/// Canonical identity name for an enrollment file name.
///
/// Strips directory components and the extension, keeps the prefix before
/// the first `_`, and uppercases it. `None` when nothing usable remains.
pub fn canonical_name(file_name: &str) -> Option<String> {
    let stem = std::path::Path::new(file_name).file_stem()?.to_str()?;
    let prefix = stem.split('_').next()?;
    if prefix.is_empty() {
        return None;
    }
    Some(prefix.to_uppercase())
}

/// Build the in-memory gallery, preserving enrollment order.
///
/// Entries with an unusable file name or an empty embedding are skipped;
/// a bad enrollment photo never aborts startup.
pub fn build_gallery(entries: Vec<GalleryEntry>) -> Vec<KnownIdentity> {
    let mut gallery = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(name) = canonical_name(&entry.file) else {
            tracing::debug!(file = %entry.file, "skipping enrollment with unusable file name");
            continue;
        };
        if entry.embedding.is_empty() {
            tracing::debug!(file = %entry.file, "skipping enrollment with no extracted face");
            continue;
        }
        gallery.push(KnownIdentity {
            name,
            embedding: Embedding::new(entry.embedding),
        });
    }
    gallery
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name_strips_suffix_and_extension() {
        assert_eq!(canonical_name("ALICE_1.jpg").as_deref(), Some("ALICE"));
        assert_eq!(canonical_name("ALICE_2.png").as_deref(), Some("ALICE"));
        assert_eq!(canonical_name("bob.jpeg").as_deref(), Some("BOB"));
    }

    #[test]
    fn test_canonical_name_uppercases() {
        assert_eq!(canonical_name("carol_home.jpg").as_deref(), Some("CAROL"));
    }

    #[test]
    fn test_canonical_name_keeps_only_first_segment() {
        assert_eq!(
            canonical_name("dave_office_2024.jpg").as_deref(),
            Some("DAVE")
        );
    }

    #[test]
    fn test_canonical_name_rejects_empty_prefix() {
        assert_eq!(canonical_name("_1.jpg"), None);
        assert_eq!(canonical_name(""), None);
    }

    #[test]
    fn test_build_gallery_skips_empty_embeddings() {
        let entries = vec![
            GalleryEntry {
                file: "ALICE_1.jpg".into(),
                embedding: vec![0.1, 0.2],
            },
            GalleryEntry {
                file: "BOB.jpg".into(),
                embedding: vec![],
            },
        ];
        let gallery = build_gallery(entries);
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery[0].name, "ALICE");
    }

    #[test]
    fn test_build_gallery_keeps_duplicate_names_separate() {
        let entries = vec![
            GalleryEntry {
                file: "ALICE_1.jpg".into(),
                embedding: vec![0.1],
            },
            GalleryEntry {
                file: "ALICE_2.jpg".into(),
                embedding: vec![0.9],
            },
        ];
        let gallery = build_gallery(entries);
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery[0].name, "ALICE");
        assert_eq!(gallery[1].name, "ALICE");
        assert_ne!(gallery[0].embedding, gallery[1].embedding);
    }

    #[test]
    fn test_build_gallery_preserves_order() {
        let entries = vec![
            GalleryEntry {
                file: "zed.jpg".into(),
                embedding: vec![1.0],
            },
            GalleryEntry {
                file: "amy.jpg".into(),
                embedding: vec![2.0],
            },
        ];
        let gallery = build_gallery(entries);
        assert_eq!(gallery[0].name, "ZED");
        assert_eq!(gallery[1].name, "AMY");
    }
}
