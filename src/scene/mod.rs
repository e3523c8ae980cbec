pub mod serialization;

pub use serialization::CatalogError;

use glam::{Mat4, Quat, Vec3};
use std::collections::HashSet;

/// Number of fallback chips offered when a message matches no scene.
pub const SUGGESTION_COUNT: usize = 3;

const BUILTIN_CATALOG: &str = include_str!("../../assets/catalog.json");

/// Placement of one splat instance - position, rotation quaternion (x, y, z, w) and scale.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SplatPlacement {
    pub url: String,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

impl SplatPlacement {
    pub fn orientation(&self) -> Quat {
        let [x, y, z, w] = self.rotation;
        let quat = Quat::from_xyzw(x, y, z, w);
        if quat.length_squared() > f32::EPSILON {
            quat.normalize()
        } else {
            Quat::IDENTITY
        }
    }
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Scene descriptor - immutable once the catalog is loaded.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneDescriptor {
    pub id: String,
    /// Title used in chat replies ("Now showing: ...").
    pub title: String,
    /// Title used by the gallery listing.
    #[serde(default)]
    pub gallery_title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model_label: Option<String>,
    pub instances: Vec<SplatPlacement>,
}

impl SceneDescriptor {
    pub fn gallery_title(&self) -> &str {
        self.gallery_title.as_deref().unwrap_or(&self.title)
    }

    pub fn model_label(&self) -> &str {
        self.model_label.as_deref().unwrap_or("Unknown")
    }
}

/// Keyword rule for the intent router; declaration order is match priority.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IntentRule {
    pub keyword: String,
    pub scene: String,
    pub title: String,
}

/// Follow-up chip shown under an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CatalogData {
    pub scenes: Vec<SceneDescriptor>,
    #[serde(default)]
    pub intents: Vec<IntentRule>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub prompt_ideas: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SceneCatalog {
    data: CatalogData,
}

impl SceneCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        serialization::parse_catalog(BUILTIN_CATALOG)
    }

    pub fn from_data(data: CatalogData) -> Result<Self, CatalogError> {
        validate(&data)?;
        Ok(Self { data })
    }

    pub fn scenes(&self) -> &[SceneDescriptor] {
        &self.data.scenes
    }

    pub fn get(&self, id: &str) -> Option<&SceneDescriptor> {
        self.data.scenes.iter().find(|scene| scene.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Display title for `id`, falling back to the id itself.
    pub fn title(&self, id: &str) -> String {
        self.get(id)
            .map(|scene| scene.title.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn intents(&self) -> &[IntentRule] {
        &self.data.intents
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.data.suggestions
    }

    pub fn prompt_ideas(&self) -> &[String] {
        &self.data.prompt_ideas
    }

    #[cfg(test)]
    pub fn data(&self) -> &CatalogData {
        &self.data
    }
}

fn validate(data: &CatalogData) -> Result<(), CatalogError> {
    if data.scenes.is_empty() {
        return Err(CatalogError::Invalid("catalog has no scenes".to_string()));
    }
    let mut ids = HashSet::new();
    for scene in &data.scenes {
        if scene.id.trim().is_empty() {
            return Err(CatalogError::Invalid("scene with empty id".to_string()));
        }
        if !ids.insert(scene.id.as_str()) {
            return Err(CatalogError::Invalid(format!(
                "duplicate scene id '{}'",
                scene.id
            )));
        }
        if scene.instances.is_empty() {
            return Err(CatalogError::Invalid(format!(
                "scene '{}' has no splat instances",
                scene.id
            )));
        }
        if let Some(instance) = scene.instances.iter().find(|i| i.url.trim().is_empty()) {
            return Err(CatalogError::Invalid(format!(
                "scene '{}' has an instance without a url ({:?})",
                scene.id, instance.position
            )));
        }
    }
    for rule in &data.intents {
        if rule.keyword.trim().is_empty() {
            return Err(CatalogError::Invalid(format!(
                "intent for '{}' has an empty keyword",
                rule.scene
            )));
        }
        if !ids.contains(rule.scene.as_str()) {
            return Err(CatalogError::Invalid(format!(
                "intent '{}' points at unknown scene '{}'",
                rule.keyword, rule.scene
            )));
        }
    }
    if data.suggestions.len() != SUGGESTION_COUNT {
        return Err(CatalogError::Invalid(format!(
            "expected {} suggestions, found {}",
            SUGGESTION_COUNT,
            data.suggestions.len()
        )));
    }
    Ok(())
}

pub fn compose_transform_matrix(position: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Mat4 {
    let [x, y, z, w] = rotation;
    let quat = Quat::from_xyzw(x, y, z, w);
    let quat = if quat.length_squared() > f32::EPSILON {
        quat.normalize()
    } else {
        Quat::IDENTITY
    };
    Mat4::from_scale_rotation_translation(Vec3::from(scale), quat, Vec3::from(position))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(url: &str) -> SplatPlacement {
        SplatPlacement {
            url: url.to_string(),
            position: [0.0, 0.0, -3.0],
            rotation: identity_rotation(),
            scale: unit_scale(),
        }
    }

    fn minimal_data() -> CatalogData {
        CatalogData {
            scenes: vec![SceneDescriptor {
                id: "one".to_string(),
                title: "One".to_string(),
                gallery_title: None,
                description: String::new(),
                model_label: None,
                instances: vec![placement("one.spz")],
            }],
            intents: vec![IntentRule {
                keyword: "uno".to_string(),
                scene: "one".to_string(),
                title: "the first one".to_string(),
            }],
            suggestions: (0..SUGGESTION_COUNT)
                .map(|i| Suggestion {
                    label: format!("chip {i}"),
                    prompt: format!("prompt {i}"),
                })
                .collect(),
            prompt_ideas: Vec::new(),
        }
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = SceneCatalog::builtin().unwrap();
        assert_eq!(catalog.scenes().len(), 7);
        assert_eq!(catalog.suggestions().len(), SUGGESTION_COUNT);
        let robots = catalog.get("multiple-splats").unwrap();
        assert_eq!(robots.instances.len(), 3);
        assert_eq!(robots.instances[0].position, [-2.0, 0.0, -3.0]);
        assert_eq!(catalog.get("multi-view").unwrap().model_label(), "Unknown");
    }

    #[test]
    fn title_falls_back_to_id() {
        let catalog = SceneCatalog::builtin().unwrap();
        assert_eq!(catalog.title("basic-butterfly"), "Beautiful Butterfly");
        assert_eq!(catalog.title("no-such-scene"), "no-such-scene");
    }

    #[test]
    fn gallery_title_defaults_to_title() {
        let catalog = SceneCatalog::from_data(minimal_data()).unwrap();
        assert_eq!(catalog.get("one").unwrap().gallery_title(), "One");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut data = minimal_data();
        data.scenes.push(data.scenes[0].clone());
        let err = SceneCatalog::from_data(data).unwrap_err();
        assert!(err.to_string().contains("duplicate scene id"));
    }

    #[test]
    fn rejects_intents_for_unknown_scenes() {
        let mut data = minimal_data();
        data.intents[0].scene = "missing".to_string();
        assert!(SceneCatalog::from_data(data).is_err());
    }

    #[test]
    fn rejects_wrong_suggestion_count() {
        let mut data = minimal_data();
        data.suggestions.pop();
        assert!(SceneCatalog::from_data(data).is_err());
    }

    #[test]
    fn flipped_placement_turns_upside_down() {
        let mut flipped = placement("butterfly.spz");
        flipped.rotation = [1.0, 0.0, 0.0, 0.0];
        let transform =
            compose_transform_matrix(flipped.position, flipped.rotation, flipped.scale);
        let up = transform.transform_vector3(Vec3::Y);
        assert!((up - Vec3::NEG_Y).length() < 1e-5);
        let origin = transform.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 0.0, -3.0)).length() < 1e-5);
    }

    #[test]
    fn degenerate_rotation_becomes_identity() {
        let mut odd = placement("odd.spz");
        odd.rotation = [0.0, 0.0, 0.0, 0.0];
        assert_eq!(odd.orientation(), Quat::IDENTITY);
    }
}
