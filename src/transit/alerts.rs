use crate::transit::proto::{FeedMessage, TranslatedString};
use crate::transit::routes::RouteClassifier;

/// Banner text for the first alert that informs a tracked route.
///
/// Whitespace is collapsed so multi-line alert bodies scroll as one line.
pub fn select_banner(feed: &FeedMessage, routes: &RouteClassifier) -> Option<String> {
    feed.entity
        .iter()
        .filter_map(|entity| entity.alert.as_ref())
        .find(|alert| {
            routes.any_tracked(
                alert
                    .informed_entity
                    .iter()
                    .filter_map(|ie| ie.route_id.as_deref()),
            )
        })
        .and_then(|alert| alert.header_text.as_ref())
        .and_then(first_translation)
}

fn first_translation(text: &TranslatedString) -> Option<String> {
    let translation = text.translation.first()?;
    let clean: String = translation
        .text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!clean.is_empty()).then_some(clean)
}
