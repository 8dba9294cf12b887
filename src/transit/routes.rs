use crate::config::RouteRule;
use crate::models::LineCategory;

/// Maps raw feed route ids onto the board's line categories.
///
/// Route ids in the feed have not been formatted consistently over time
/// ("201", "201-20666", "Red Line"), so rules match by substring, in order.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    rules: Vec<(String, LineCategory)>,
    fallback: LineCategory,
}

impl RouteClassifier {
    pub fn new(rules: &[RouteRule], fallback: LineCategory) -> Self {
        RouteClassifier {
            rules: rules
                .iter()
                .map(|r| (r.pattern.trim().to_lowercase(), r.line))
                .collect(),
            fallback,
        }
    }

    fn matching_rule(&self, route_id: &str) -> Option<LineCategory> {
        let route_id = route_id.to_lowercase();
        self.rules
            .iter()
            .find(|(pattern, _)| route_id.contains(pattern.as_str()))
            .map(|(_, line)| *line)
    }

    /// Whether a trip on this route belongs on the board at all.
    pub fn is_tracked(&self, route_id: &str) -> bool {
        !route_id.is_empty() && self.matching_rule(route_id).is_some()
    }

    /// Total: unknown ids get the fallback category.
    pub fn classify(&self, route_id: &str) -> LineCategory {
        self.matching_rule(route_id).unwrap_or(self.fallback)
    }

    /// Whether any of the given route ids is tracked (alert matching).
    pub fn any_tracked<'a>(&self, mut route_ids: impl Iterator<Item = &'a str>) -> bool {
        route_ids.any(|id| self.is_tracked(id))
    }
}
