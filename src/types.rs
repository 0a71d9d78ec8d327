//! Records stored in `albums.json`.
//!
//! These types are the contract between the reconciliation pipeline and the
//! browser front-end, so field names follow the document's camelCase keys.
//! Fields this crate does not know about are kept in `extra` and written back
//! untouched, which lets the front-end grow the schema without the pipeline
//! silently dropping data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named, ordered collection of photos backed by one source directory.
///
/// The album key is not stored here: it is the document's map key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub images: Vec<Photo>,
    /// Hidden from aggregate views, still reachable by key. Absent and
    /// `false` are both public; whichever the document holds is written back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Album {
    pub fn is_private(&self) -> bool {
        self.is_private.unwrap_or(false)
    }
}

/// One image within an album.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub full: String,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    /// Explicit position; outranks `date` when sorting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<Accessibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<Technical>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PhotoMetadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Photo {
    /// Source filename recorded at import time, if any.
    pub fn original_filename(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.original_filename.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Natural pixel size recorded at import time, if any.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.technical.as_ref().and_then(|t| t.dimensions)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessibility {
    #[serde(default)]
    pub alt_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Camera, lens and exposure settings read from embedded metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technical {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    /// Join key used by cleanup to check that the source still exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<Gps>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gps {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_parses_camel_case_fields() {
        let json = r#"{
            "id": "travel-dawn-1700000000",
            "title": "Dawn",
            "thumbnail": "thumbnails/travel/travel-dawn-1700000000.jpg",
            "full": "full/travel/travel-dawn-1700000000.jpg",
            "date": "2023-05-01",
            "order": 2,
            "accessibility": {"altText": "Sunrise over hills"},
            "technical": {"camera": "X100V", "dimensions": {"width": 3000, "height": 2000}},
            "tags": ["landscape"],
            "metadata": {"originalFilename": "dawn.jpg"}
        }"#;
        let photo: Photo = serde_json::from_str(json).unwrap();
        assert_eq!(photo.order, Some(2));
        assert_eq!(photo.original_filename(), Some("dawn.jpg"));
        assert_eq!(
            photo.dimensions(),
            Some(Dimensions {
                width: 3000,
                height: 2000
            })
        );
        assert_eq!(
            photo.accessibility.unwrap().alt_text,
            "Sunrise over hills"
        );
    }

    #[test]
    fn unknown_fields_survive_a_rewrite() {
        let json = r#"{"id": "a-1", "likes": 12, "metadata": {"originalFilename": "a.jpg", "source": "phone"}}"#;
        let photo: Photo = serde_json::from_str(json).unwrap();
        let value = serde_json::to_value(&photo).unwrap();
        assert_eq!(value["likes"], 12);
        assert_eq!(value["metadata"]["source"], "phone");
    }

    #[test]
    fn private_flag_written_back_as_found() {
        let album = Album {
            title: "Street".into(),
            ..Default::default()
        };
        assert!(!album.is_private());
        let value = serde_json::to_value(&album).unwrap();
        assert!(value.get("isPrivate").is_none());

        let explicit: Album =
            serde_json::from_str(r#"{"title": "Street", "isPrivate": false}"#).unwrap();
        assert!(!explicit.is_private());
        let value = serde_json::to_value(&explicit).unwrap();
        assert_eq!(value["isPrivate"], false);

        let private = Album {
            is_private: Some(true),
            ..album
        };
        assert!(private.is_private());
        let value = serde_json::to_value(&private).unwrap();
        assert_eq!(value["isPrivate"], true);
    }

    #[test]
    fn empty_original_filename_counts_as_absent() {
        let photo = Photo {
            id: "x".into(),
            metadata: Some(PhotoMetadata {
                original_filename: Some(String::new()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(photo.original_filename(), None);
    }
}
