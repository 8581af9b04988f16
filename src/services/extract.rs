//! Readable-content extraction from archived HTML.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::utils::{clip_chars, normalize_whitespace};

static MAIN_CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article, main").expect("valid selector"));
static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid selector"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid selector"));

const SKIPPED_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

const MIN_MAIN_WORDS: usize = 40;
const MIN_PARAGRAPH_WORDS: usize = 8;
const MAX_PARAGRAPHS: usize = 8;

/// Extract a readable summary of a page, clipped to `max_chars` characters.
///
/// Prefers an `article`/`main` element with enough words, then the first
/// substantial paragraphs, then the whole body.
pub fn extract_readable(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);

    let text = main_content(&document)
        .or_else(|| paragraphs(&document))
        .unwrap_or_else(|| body_text(&document));

    clip_chars(&text, max_chars).trim_end().to_string()
}

fn main_content(document: &Html) -> Option<String> {
    document
        .select(&MAIN_CONTENT)
        .map(visible_text)
        .find(|text| word_count(text) >= MIN_MAIN_WORDS)
}

fn paragraphs(document: &Html) -> Option<String> {
    let picked: Vec<String> = document
        .select(&PARAGRAPH)
        .map(visible_text)
        .filter(|text| word_count(text) >= MIN_PARAGRAPH_WORDS)
        .take(MAX_PARAGRAPHS)
        .collect();

    (!picked.is_empty()).then(|| picked.join(" "))
}

fn body_text(document: &Html) -> String {
    document
        .select(&BODY)
        .next()
        .map(visible_text)
        .unwrap_or_else(|| visible_text(document.root_element()))
}

/// Text content of an element, minus script-like descendants.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }
    normalize_whitespace(&raw)
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
