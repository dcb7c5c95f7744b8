//! Shielding markup and template placeholders from the translation engine.
//!
//! [`protect`] swaps every closing tag, remaining tag and `{{...}}`
//! placeholder for a short sentinel and records the originals. [`restore`]
//! puts them back into the translated text.
//!
//! The record is filled pass by pass (closing tags, then other tags, then
//! placeholders), not in the left-to-right order of the sentinels in the
//! masked string. Restoration walks the sentinels of the translated text
//! and hands each one the next unused entry of its kind, so each kind is
//! restored left to right and the kinds never interfere with each other.
//!
//! Source text that already contains a sentinel literal (`{1}`, `{2}` or
//! `{{}}`) has that literal captured like a tag of the matching kind, so it
//! travels as a sentinel and comes back verbatim.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{KotobaError, Result};

// </b>, </span> and anything else starting with "</" up to the next ">"
// that has no whitespace before it, plus the literal sentinel "{2}".
// Placeholders are matched only to be stepped over.
static CLOSING_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</\S+>|\{\{.*?\}\}|\{2\}").expect("valid closing tag regex"));

// <b>, <a href="...">, <br/>, plus the literal sentinel "{1}"
static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>|\{\{.*?\}\}|\{1\}").expect("valid tag regex"));

// {{count}}, {{ user.name }}, a literal {{}}; shortest match, single line
static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{.*?\}\}").expect("valid placeholder regex"));

static SENTINEL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\}\}|\{1\}|\{2\}").expect("valid sentinel regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    ClosingTag,
    Tag,
    Placeholder,
}

impl TagKind {
    pub const ALL: [TagKind; 3] = [TagKind::ClosingTag, TagKind::Tag, TagKind::Placeholder];

    pub fn sentinel(self) -> &'static str {
        match self {
            TagKind::ClosingTag => "{2}",
            TagKind::Tag => "{1}",
            TagKind::Placeholder => "{{}}",
        }
    }

    fn from_sentinel(sentinel: &str) -> Option<TagKind> {
        TagKind::ALL.into_iter().find(|kind| kind.sentinel() == sentinel)
    }

    fn index(self) -> usize {
        match self {
            TagKind::ClosingTag => 0,
            TagKind::Tag => 1,
            TagKind::Placeholder => 2,
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            TagKind::ClosingTag => &*CLOSING_TAG_REGEX,
            TagKind::Tag => &*TAG_REGEX,
            TagKind::Placeholder => &*PLACEHOLDER_REGEX,
        }
    }

    /// Classify an original substring by its prefix: `</` is a closing tag,
    /// `<` without any `/` is a tag, `{{` is a placeholder.
    pub fn classify(original: &str) -> Option<TagKind> {
        if original.starts_with("</") {
            Some(TagKind::ClosingTag)
        } else if original.starts_with('<') && !original.contains('/') {
            Some(TagKind::Tag)
        } else if original.starts_with("{{") {
            Some(TagKind::Placeholder)
        } else {
            None
        }
    }
}

/// A protected substring and the pass that captured it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub kind: TagKind,
    pub original: String,
}

/// Originals removed from one string, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRecord {
    entries: Vec<TagEntry>,
}

impl TagRecord {
    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn originals(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.original.as_str())
    }
}

/// A masked string ready to be sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protected {
    pub masked: String,
    pub record: TagRecord,
}

/// Outcome of restoring one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub text: String,
    /// Entries whose sentinel could not be found in the translated text
    pub unconsumed: Vec<TagEntry>,
}

impl Restored {
    pub fn is_complete(&self) -> bool {
        self.unconsumed.is_empty()
    }
}

/// Replace markup and placeholders with sentinels.
pub fn protect(text: &str) -> Protected {
    let mut record = TagRecord::default();
    let mut masked = text.to_string();

    for kind in TagKind::ALL {
        let regex = kind.regex();
        if !regex.is_match(&masked) {
            continue;
        }
        let replaced = regex.replace_all(&masked, |caps: &regex::Captures| {
            let matched = &caps[0];
            if kind != TagKind::Placeholder && matched.starts_with("{{") {
                return matched.to_string();
            }
            record.entries.push(TagEntry {
                kind,
                original: matched.to_string(),
            });
            kind.sentinel().to_string()
        });
        masked = replaced.into_owned();
    }

    Protected { masked, record }
}

pub fn protect_all<S: AsRef<str>>(texts: &[S]) -> Vec<Protected> {
    texts.iter().map(|t| protect(t.as_ref())).collect()
}

/// Put recorded originals back in place of their sentinels.
///
/// Entries are matched to sentinels by the kind stored when they were
/// recorded, not by [`TagKind::classify`]: the prefix rule cannot place
/// `<br/>` or `<a href="http://...">`, which the tag pass captures.
pub fn restore(translated: &str, record: &TagRecord) -> Restored {
    let mut queues: [Vec<&TagEntry>; 3] = Default::default();
    for entry in &record.entries {
        queues[entry.kind.index()].push(entry);
    }
    let mut next = [0usize; 3];

    let text = SENTINEL_REGEX
        .replace_all(translated, |caps: &regex::Captures| {
            let sentinel = &caps[0];
            let Some(kind) = TagKind::from_sentinel(sentinel) else {
                return sentinel.to_string();
            };
            let idx = kind.index();
            match queues[idx].get(next[idx]) {
                Some(entry) => {
                    next[idx] += 1;
                    entry.original.clone()
                }
                None => sentinel.to_string(),
            }
        })
        .into_owned();

    let unconsumed = TagKind::ALL
        .into_iter()
        .flat_map(|kind| queues[kind.index()][next[kind.index()]..].iter().map(|e| (*e).clone()))
        .collect();

    Restored { text, unconsumed }
}

/// Count sentinels of every kind, in [`TagKind::ALL`] order.
pub fn sentinel_counts(text: &str) -> [usize; 3] {
    let mut counts = [0usize; 3];
    for found in SENTINEL_REGEX.find_iter(text) {
        if let Some(kind) = TagKind::from_sentinel(found.as_str()) {
            counts[kind.index()] += 1;
        }
    }
    counts
}

/// Restore one string and fail if the provider dropped or duplicated a
/// sentinel.
pub fn restore_checked(masked: &str, translated: &str, record: &TagRecord) -> Result<String> {
    let sent = sentinel_counts(masked);
    let received = sentinel_counts(translated);
    if sent != received {
        return Err(KotobaError::StructuralMismatch(format!(
            "sentinel counts changed in translation ({{2}}/{{1}}/{{{{}}}}: sent {:?}, received {:?}) for \"{}\"",
            sent, received, masked
        )));
    }

    let restored = restore(translated, record);
    if !restored.is_complete() {
        return Err(KotobaError::StructuralMismatch(format!(
            "{} of {} tags could not be restored into \"{}\"",
            restored.unconsumed.len(),
            record.len(),
            translated
        )));
    }

    Ok(restored.text)
}
