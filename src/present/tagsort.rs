//! Tag ordering with word-count buckets kept in ascending numeric order.
//!
//! Word-count tags look like `wc:<1k` (fewer than 1000 words) or
//! `wc:1k-5k` (between 1000 and 5000). Sorted as plain strings they come
//! out as `wc:10k-20k, wc:1k-5k, wc:5k-10k, wc:<1k`; here they sort as
//! `wc:<1k, wc:1k-5k, wc:5k-10k, wc:10k-20k`. Every other tag sorts by
//! plain string order, and the word-count tags sit together as one block
//! at the position of the `wc:` prefix.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

static WC_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^wc:(?:(?:<|&lt;)(?P<upper_open>\d+)k|(?P<lower>\d+)k-(?P<upper>\d+)k)$")
        .expect("valid regex")
});

const WC_PREFIX: &str = "wc:";

/// A parsed word-count bucket, in thousands of words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCount {
    /// `wc:<N k`
    OpenUpper(u64),
    /// `wc:N k-M k`
    ClosedRange(u64, u64),
}

impl WordCount {
    pub fn parse(tag: &str) -> Option<Self> {
        let caps = WC_TAG.captures(tag)?;
        if let Some(n) = caps.name("upper_open") {
            return n.as_str().parse().ok().map(Self::OpenUpper);
        }
        let lo = caps.name("lower")?.as_str().parse().ok()?;
        let hi = caps.name("upper")?.as_str().parse().ok()?;
        Some(Self::ClosedRange(lo, hi))
    }

    /// (bound compared, open-before-closed, tiebreak)
    fn sort_key(self) -> (u64, u8, u64) {
        match self {
            Self::OpenUpper(n) => (n, 0, 0),
            Self::ClosedRange(lo, hi) => (lo, 1, hi),
        }
    }
}

impl Ord for WordCount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for WordCount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort key for one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKey<'a> {
    WordCount(WordCount),
    Plain(&'a str),
}

impl<'a> TagKey<'a> {
    pub fn of(tag: &'a str) -> Self {
        WordCount::parse(tag).map_or(Self::Plain(tag), Self::WordCount)
    }
}

impl Ord for TagKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::WordCount(a), Self::WordCount(b)) => a.cmp(b),
            (Self::Plain(a), Self::Plain(b)) => a.cmp(b),
            (Self::WordCount(_), Self::Plain(p)) => WC_PREFIX.cmp(p).then(Ordering::Less),
            (Self::Plain(p), Self::WordCount(_)) => (*p).cmp(WC_PREFIX).then(Ordering::Greater),
        }
    }
}

impl PartialOrd for TagKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two tags under the custom ordering.
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    TagKey::of(a).cmp(&TagKey::of(b))
}

/// Return `tags` sorted under the custom ordering.
pub fn custom_tag_sort<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tags: Vec<String> = tags.into_iter().map(Into::into).collect();
    tags.sort_by(|a, b| compare_tags(a, b));
    tags
}
