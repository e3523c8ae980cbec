use crate::scene::{CatalogData, SceneCatalog};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

pub fn parse_catalog(json: &str) -> Result<SceneCatalog> {
    let data: CatalogData = serde_json::from_str(json)?;
    SceneCatalog::from_data(data)
}

pub fn load_catalog_from_file(path: &Path) -> Result<SceneCatalog> {
    let json = std::fs::read_to_string(path)?;
    parse_catalog(&json)
}

#[cfg(test)]
pub fn save_catalog_to_file(catalog: &SceneCatalog, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(catalog.data())?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_file_roundtrip() {
        let catalog = SceneCatalog::builtin().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        save_catalog_to_file(&catalog, &path).unwrap();
        let loaded = load_catalog_from_file(&path).unwrap();
        assert_eq!(loaded.scenes(), catalog.scenes());
        assert_eq!(loaded.intents(), catalog.intents());
    }

    #[test]
    fn test_defaults_fill_missing_transform_fields() {
        let json = r#"{
            "scenes": [
                { "id": "solo", "title": "Solo", "instances": [ { "url": "solo.spz" } ] }
            ],
            "suggestions": [
                { "label": "a", "prompt": "a" },
                { "label": "b", "prompt": "b" },
                { "label": "c", "prompt": "c" }
            ]
        }"#;
        let catalog = parse_catalog(json).unwrap();
        let placement = &catalog.get("solo").unwrap().instances[0];
        assert_eq!(placement.position, [0.0, 0.0, 0.0]);
        assert_eq!(placement.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(placement.scale, [1.0, 1.0, 1.0]);
        assert!(catalog.intents().is_empty());
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let err = parse_catalog("{ not json").unwrap_err();
        assert!(matches!(err, CatalogError::Json(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_catalog_from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io(_)));
    }
}
