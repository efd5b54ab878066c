//! Typed views of the payloads the API returns.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user or business account profile.
/// The server sends Mongo-style `_id`; `id` is accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Image file for a multipart upload.
#[derive(Clone, PartialEq)]
pub struct ImageFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = Self::mime_for(&file_name).to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image file {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }

    /// Guess the mime type from the file extension.
    pub fn mime_for(file_name: &str) -> &'static str {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_profile_with_mongo_id() {
        let profile: UserProfile = serde_json::from_value(json!({
            "_id": "u1",
            "name": "Ann",
            "email": "a@b.com",
            "profileImage": "https://cdn.example/u1.png",
            "isVerified": true
        }))
        .unwrap();
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.profile_image.as_deref(), Some("https://cdn.example/u1.png"));
        assert_eq!(profile.extra.get("isVerified"), Some(&json!(true)));
        assert_eq!(profile.display_name(), "Ann");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let profile: UserProfile = serde_json::from_value(json!({"id": "u2"})).unwrap();
        assert_eq!(profile.display_name(), "u2");
    }

    #[test]
    fn test_parse_category() {
        let category: Category =
            serde_json::from_value(json!({"_id": "c1", "name": "Restaurants"})).unwrap();
        assert_eq!(category.id, "c1");
        assert_eq!(category.name, "Restaurants");
        assert!(category.description.is_none());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(ImageFile::mime_for("me.PNG"), "image/png");
        assert_eq!(ImageFile::mime_for("photo.jpeg"), "image/jpeg");
        assert_eq!(ImageFile::mime_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avatar.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let file = ImageFile::from_path(&path).unwrap();
        assert_eq!(file.file_name, "avatar.jpg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.bytes.len(), 3);
    }
}
