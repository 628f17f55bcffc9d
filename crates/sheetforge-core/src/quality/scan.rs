//! Lightweight HTML scanning. Regex-based on purpose: the input is our own
//! generated markup, and the gate only needs counts and presence tests.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:p|div|li|br|h[1-6]|section|header|footer|figure|tr|ol|ul|table)\b[^>]*>")
        .expect("static regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));
static STYLE_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>|<script\b[^>]*>.*?</script\s*>|<!--.*?-->")
        .expect("static regex")
});
static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
});
static DATA_ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdata-item-id\s*=").expect("static regex"));
static NUMBERED_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3})[.)]\s+\S").expect("static regex"));

/// Remove `<style>`, `<script>` and comment blocks.
pub fn without_style_and_script(html: &str) -> String {
    STYLE_SCRIPT_RE.replace_all(html, " ").into_owned()
}

/// Visible text, one line per block element, whitespace collapsed.
pub fn visible_text(html: &str) -> String {
    let body = without_style_and_script(html);
    let blocks = BLOCK_TAG_RE.replace_all(&body, "\n");
    let text = TAG_RE.replace_all(&blocks, " ");
    let text = decode_entities(&text);

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&middot;", "·")
        .replace("&amp;", "&")
}

/// Number of `class` attributes containing `token` as a whole class name.
pub fn class_token_count(html: &str, token: &str) -> usize {
    CLASS_ATTR_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .filter(|m| m.as_str().split_whitespace().any(|t| t.eq_ignore_ascii_case(token)))
        .count()
}

pub fn data_item_id_count(html: &str) -> usize {
    DATA_ITEM_ID_RE.find_iter(html).count()
}

/// Distinct list numbers ("1.", "2)") at the start of text lines.
pub fn numbered_lines(text: &str) -> usize {
    text.lines()
        .filter_map(|line| NUMBERED_LINE_RE.captures(line.trim_start()))
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Count of opening tags named `tag` (not prefixes like `<pre` for `p`).
pub fn open_tag_count(html: &str, tag: &str) -> usize {
    let lower = html.to_ascii_lowercase();
    let needle = format!("<{tag}");
    lower
        .match_indices(&needle)
        .filter(|(i, _)| {
            lower[i + needle.len()..]
                .chars()
                .next()
                .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
        })
        .count()
}

pub fn close_tag_count(html: &str, tag: &str) -> usize {
    let lower = html.to_ascii_lowercase();
    let needle = format!("</{tag}");
    lower
        .match_indices(&needle)
        .filter(|(i, _)| {
            lower[i + needle.len()..]
                .chars()
                .next()
                .is_some_and(|c| c == '>' || c.is_whitespace())
        })
        .count()
}
