// src/query.rs

//! Query string translation.
//!
//! A query string mixes free text with `tags:<value>` filters, quoted with
//! shell-word rules:
//!
//! ```text
//! "borrow checker" tags:rust tags:wc:<1k
//! ```
//!
//! Free text becomes a query-string clause that must match; tag filters
//! must all be present on a hit. Translation never fails: input that does
//! not tokenize is passed through as one literal token.

use std::borrow::Cow;

use crate::models::{SortOrder, StructuredQuery, TagFilter, TermsAggregation};

/// Prefix marking a tag filter token.
pub const TAG_PREFIX: &str = "tags:";

/// Default number of tag facet buckets requested with every query.
pub const DEFAULT_FACET_SIZE: usize = 200;

/// Split a query string into tokens, falling back to the whole string.
pub fn tokenize(query_string: &str) -> Vec<String> {
    let trimmed = query_string.trim();
    shlex::split(trimmed).unwrap_or_else(|| vec![trimmed.to_string()])
}

fn tag_value(token: &str) -> Option<&str> {
    token.strip_prefix(TAG_PREFIX)
}

/// Translate a query string into a [`StructuredQuery`].
///
/// `page` is 1-based; `page` and `page_size` of 0 are treated as 1.
pub fn translate(query_string: &str, page: usize, page_size: usize) -> StructuredQuery {
    translate_with_facets(query_string, page, page_size, DEFAULT_FACET_SIZE)
}

/// [`translate`] with an explicit tag facet size.
pub fn translate_with_facets(
    query_string: &str,
    page: usize,
    page_size: usize,
    facet_size: usize,
) -> StructuredQuery {
    let page = page.max(1);
    let page_size = page_size.max(1);

    let tokens = tokenize(query_string);

    let (tag_tokens, text_tokens): (Vec<&String>, Vec<&String>) =
        tokens.iter().partition(|t| tag_value(t).is_some());

    let free_text = (!text_tokens.is_empty()).then(|| {
        text_tokens
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    });

    let tags: Vec<String> = tag_tokens
        .iter()
        .filter_map(|t| tag_value(t))
        .map(String::from)
        .collect();
    let tag_filter = (!tags.is_empty()).then(|| TagFilter::all_of(tags));

    // Pure filters have no meaningful relevance order.
    let sort = free_text.is_none().then_some(SortOrder::DateAddedDesc);

    StructuredQuery {
        from: (page - 1).saturating_mul(page_size),
        size: page_size,
        free_text,
        tag_filter,
        sort,
        aggregation: TermsAggregation::tags(facet_size),
    }
}

/// Append a `tags:<tag>` filter unless the query already has exactly that token.
pub fn add_tag_to_query(query_string: &str, tag: &str) -> String {
    let marker = format!("{TAG_PREFIX}{tag}");
    let trimmed = query_string.trim();

    let needs_quoting = marker
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '#'));
    let token = if needs_quoting {
        shlex::try_quote(&marker).unwrap_or(Cow::Borrowed(marker.as_str()))
    } else {
        Cow::Borrowed(marker.as_str())
    };

    let present = match shlex::split(trimmed) {
        Some(tokens) => tokens.iter().any(|t| *t == marker),
        // Unbalanced quotes: a previously appended token may sit inside the
        // open quote, so also look for it at the end of the raw text.
        None => {
            trimmed.split_whitespace().any(|w| w == marker)
                || ends_with_word(trimmed, &token)
                || ends_with_word(trimmed, &marker)
        }
    };
    if present {
        return query_string.to_string();
    }

    format!("{} {}", trimmed, token).trim().to_string()
}

fn ends_with_word(text: &str, suffix: &str) -> bool {
    match text.strip_suffix(suffix) {
        Some(rest) => rest.is_empty() || rest.ends_with(char::is_whitespace),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_sorts_by_date() {
        let q = translate("", 1, 96);
        assert_eq!(q.sort, Some(SortOrder::DateAddedDesc));
        assert_eq!(q.free_text, None);
        assert_eq!(q.tag_filter, None);
        assert_eq!(q.from, 0);
        assert_eq!(q.size, 96);
    }

    #[test]
    fn test_all_filter_query_sorts_by_date() {
        let q = translate("tags:foo tags:bar", 1, 10);
        assert_eq!(q.sort, Some(SortOrder::DateAddedDesc));
        assert_eq!(q.free_text, None);

        let filter = q.tag_filter.unwrap();
        assert_eq!(filter.terms, vec!["foo", "bar"]);
        assert_eq!(filter.minimum_should_match, 2);
    }

    #[test]
    fn test_mixed_query() {
        let q = translate("hello tags:foo", 1, 10);
        assert_eq!(q.free_text.as_deref(), Some("hello"));
        assert_eq!(q.tag_filter.unwrap().terms, vec!["foo"]);
        assert_eq!(q.sort, None);
    }

    #[test]
    fn test_quoted_phrase_and_tag() {
        let q = translate(r#""borrow checker" "tags:wc:<1k" lifetimes"#, 1, 10);
        assert_eq!(q.free_text.as_deref(), Some("borrow checker lifetimes"));
        assert_eq!(q.tag_filter.unwrap().terms, vec!["wc:<1k"]);
    }

    #[test]
    fn test_unbalanced_quotes_fall_back_to_literal() {
        let q = translate(r#"  say "hello tags:x  "#, 1, 10);
        assert_eq!(q.free_text.as_deref(), Some(r#"say "hello tags:x"#));
        assert_eq!(q.tag_filter, None);
    }

    #[test]
    fn test_offset_and_aggregation() {
        let q = translate_with_facets("x", 3, 25, 150);
        assert_eq!(q.from, 50);
        assert_eq!(q.size, 25);
        assert_eq!(q.aggregation.field, "tags.raw");
        assert_eq!(q.aggregation.size, 150);
        assert_eq!(translate("x", 1, 10).aggregation.size, DEFAULT_FACET_SIZE);
    }

    #[test]
    fn test_add_tag_appends() {
        assert_eq!(add_tag_to_query("", "rust"), "tags:rust");
        assert_eq!(add_tag_to_query("hello", "rust"), "hello tags:rust");
    }

    #[test]
    fn test_add_tag_is_idempotent() {
        let once = add_tag_to_query("hello", "rust");
        assert_eq!(add_tag_to_query(&once, "rust"), once);

        let spaced = add_tag_to_query("x", "two words");
        assert_eq!(add_tag_to_query(&spaced, "two words"), spaced);
    }

    #[test]
    fn test_add_tag_matches_whole_tokens_only() {
        assert_eq!(
            add_tag_to_query("tags:rusty", "rust"),
            "tags:rusty tags:rust"
        );
        assert_eq!(add_tag_to_query("tags:rust x", "rust"), "tags:rust x");
    }

    #[test]
    fn test_add_tag_idempotent_with_unbalanced_quotes() {
        let once = add_tag_to_query(r#"say "hi"#, "rust");
        assert_eq!(once, r#"say "hi tags:rust"#);
        assert_eq!(add_tag_to_query(&once, "rust"), once);
    }

    #[test]
    fn test_add_tag_spaced_tag_idempotent_with_unbalanced_quotes() {
        let once = add_tag_to_query(r#"say "hi"#, "two words");
        assert_eq!(once, r#"say "hi 'tags:two words'"#);
        assert_eq!(add_tag_to_query(&once, "two words"), once);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let q = translate("x", usize::MAX, 96);
        assert_eq!(q.from, usize::MAX);
        assert_eq!(q.size, 96);
    }
}
