use crate::scene::{IntentRule, SceneCatalog, Suggestion, SUGGESTION_COUNT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub scene_id: String,
    pub title: String,
}

/// Keyword lookup from free text to a catalog scene. Rules are tried in catalog
/// order and the first keyword contained in the message wins.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    rules: Vec<IntentRule>,
    fallback: Vec<Suggestion>,
}

impl IntentRouter {
    pub fn new(rules: Vec<IntentRule>, fallback: Vec<Suggestion>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| IntentRule {
                keyword: rule.keyword.to_lowercase(),
                ..rule
            })
            .filter(|rule| !rule.keyword.trim().is_empty())
            .collect();
        Self { rules, fallback }
    }

    pub fn from_catalog(catalog: &SceneCatalog) -> Self {
        Self::new(catalog.intents().to_vec(), catalog.suggestions().to_vec())
    }

    pub fn route(&self, message: &str) -> Option<RouteMatch> {
        let message = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| message.contains(rule.keyword.as_str()))
            .map(|rule| RouteMatch {
                scene_id: rule.scene.clone(),
                title: rule.title.clone(),
            })
    }

    pub fn fallback_suggestions(&self) -> &[Suggestion] {
        let len = self.fallback.len().min(SUGGESTION_COUNT);
        &self.fallback[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> IntentRouter {
        IntentRouter::from_catalog(&SceneCatalog::builtin().unwrap())
    }

    #[test]
    fn routes_case_insensitively() {
        let router = router();
        let found = router.route("Show me a BUTTERFLY please").unwrap();
        assert_eq!(found.scene_id, "basic-butterfly");
        assert_eq!(router.route("robots!").unwrap().scene_id, "multiple-splats");
        assert_eq!(router.route("a food spread").unwrap().scene_id, "food-gallery");
    }

    #[test]
    fn first_rule_in_table_order_wins() {
        let router = router();
        // "butterfly" precedes "robot" in the table regardless of message order.
        assert_eq!(
            router.route("a robot chasing a butterfly").unwrap().scene_id,
            "basic-butterfly"
        );
    }

    #[test]
    fn unmatched_message_gets_three_fallbacks() {
        let router = router();
        assert_eq!(router.route("quantum toaster"), None);
        assert_eq!(router.route(""), None);
        assert_eq!(router.fallback_suggestions().len(), SUGGESTION_COUNT);
    }

    #[test]
    fn blank_keywords_never_match() {
        let router = IntentRouter::new(
            vec![IntentRule {
                keyword: "  ".to_string(),
                scene: "anything".to_string(),
                title: "Anything".to_string(),
            }],
            Vec::new(),
        );
        assert_eq!(router.route("hello world"), None);
    }
}
