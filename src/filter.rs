//! C4 -- tag predicates deciding whether an object qualifies for area
//! building.
//!
//! Modeled as a small capability record (a boxed closure) rather than a
//! matcher trait hierarchy, per the "deep virtual dispatch... small
//! capability record" guidance for this kind of pluggable predicate.

use crate::model::Tag;

/// A predicate over a single string (a tag key or value).
pub struct StringMatcher(Box<dyn Fn(&str) -> bool + Send + Sync>);

impl StringMatcher {
    pub fn exact(value: impl Into<String>) -> Self {
        let value = value.into();
        StringMatcher(Box::new(move |s| s == value))
    }

    pub fn any() -> Self {
        StringMatcher(Box::new(|_| true))
    }

    pub fn none() -> Self {
        StringMatcher(Box::new(|_| false))
    }

    pub fn one_of(values: Vec<String>) -> Self {
        StringMatcher(Box::new(move |s| values.iter().any(|v| v == s)))
    }

    pub fn matches(&self, s: &str) -> bool {
        (self.0)(s)
    }
}

/// A predicate over a tag set: `(key, value)` pairs.
///
/// A tag matches a keyed matcher iff `key_matcher(key) && (value_matcher(value) ^ invert)`.
/// `any_of` (a tag-list matcher) is true iff any tag in the set satisfies
/// the inner matcher.
pub struct TagMatcher(Box<dyn Fn(&[Tag]) -> bool + Send + Sync>);

impl TagMatcher {
    pub fn always_true() -> Self {
        TagMatcher(Box::new(|_| true))
    }

    pub fn always_false() -> Self {
        TagMatcher(Box::new(|_| false))
    }

    /// A tag list matcher: true iff at least one tag matches
    /// `key_matcher(key) && (value_matcher(value) ^ invert)`.
    pub fn keyed(key: StringMatcher, value: StringMatcher, invert: bool) -> Self {
        TagMatcher(Box::new(move |tags| {
            tags.iter()
                .any(|(k, v)| key.matches(k) && (value.matches(v) ^ invert))
        }))
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self::keyed(StringMatcher::exact(key), StringMatcher::any(), false)
    }

    pub fn key_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::keyed(StringMatcher::exact(key), StringMatcher::exact(value), false)
    }

    /// Combines several matchers into one tag-list matcher: true iff any of
    /// `matchers` matches.
    pub fn any_of(matchers: Vec<TagMatcher>) -> Self {
        TagMatcher(Box::new(move |tags| matchers.iter().any(|m| m.matches(tags))))
    }

    pub fn matches(&self, tags: &[Tag]) -> bool {
        (self.0)(tags)
    }
}

impl Default for TagMatcher {
    fn default() -> Self {
        TagMatcher::always_true()
    }
}

/// Tags of a relation with `type` value, used by the area filter's
/// `type=multipolygon` / `type=boundary` check.
pub fn relation_type<'a>(tags: &'a [Tag]) -> Option<&'a str> {
    tags.iter().find(|(k, _)| k == "type").map(|(_, v)| v.as_str())
}

/// The area filter: a relation must declare `type=multipolygon` or
/// `type=boundary`, and its remaining tags (`type` excluded) must satisfy
/// the user-supplied matcher.
pub fn relation_qualifies(tags: &[Tag], user_filter: &TagMatcher) -> bool {
    match relation_type(tags) {
        Some("multipolygon") | Some("boundary") => {
            let rest: Vec<Tag> = tags
                .iter()
                .filter(|(k, _)| k != "type")
                .cloned()
                .collect();
            user_filter.matches(&rest)
        }
        _ => false,
    }
}

/// `area=no` suppresses closed-way area building even when the way is
/// otherwise closed and filter-matched.
pub fn is_area_no(tags: &[Tag]) -> bool {
    tags.iter().any(|(k, v)| k == "area" && v == "no")
}

#[cfg(test)]
mod test {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn always_true_matches_empty_tags() {
        assert!(TagMatcher::always_true().matches(&[]));
    }

    #[test]
    fn always_false_never_matches() {
        assert!(!TagMatcher::always_false().matches(&tags(&[("a", "b")])));
    }

    #[test]
    fn key_value_matches_exact_pair() {
        let m = TagMatcher::key_value("building", "yes");
        assert!(m.matches(&tags(&[("building", "yes")])));
        assert!(!m.matches(&tags(&[("building", "no")])));
    }

    #[test]
    fn invert_flips_value_match() {
        let m = TagMatcher::keyed(StringMatcher::exact("building"), StringMatcher::exact("no"), true);
        assert!(m.matches(&tags(&[("building", "yes")])));
        assert!(!m.matches(&tags(&[("building", "no")])));
    }

    #[test]
    fn relation_qualifies_requires_multipolygon_or_boundary_type() {
        let always = TagMatcher::always_true();
        assert!(relation_qualifies(&tags(&[("type", "multipolygon")]), &always));
        assert!(relation_qualifies(&tags(&[("type", "boundary")]), &always));
        assert!(!relation_qualifies(&tags(&[("type", "route")]), &always));
    }

    #[test]
    fn relation_qualifies_excludes_type_tag_from_user_filter() {
        let m = TagMatcher::key("landuse");
        assert!(!relation_qualifies(&tags(&[("type", "multipolygon")]), &m));
        assert!(relation_qualifies(
            &tags(&[("type", "multipolygon"), ("landuse", "forest")]),
            &m
        ));
    }

    #[test]
    fn area_no_is_detected() {
        assert!(is_area_no(&tags(&[("area", "no")])));
        assert!(!is_area_no(&tags(&[("area", "yes")])));
    }
}
