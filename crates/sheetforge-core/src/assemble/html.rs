//! Shared HTML building blocks: escaping, the document shell, print CSS.

use chrono::{DateTime, Utc};

/// Escape text for element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Print stylesheet shared by every artifact. Flat colors and system fonts
/// only, so pages print the same everywhere.
pub const PRINT_CSS: &str = r#"
@page { size: letter; margin: 0.6in; }
* { box-sizing: border-box; }
body { font-family: "Helvetica Neue", Arial, sans-serif; font-size: 13pt; line-height: 1.45; color: #000; background: #fff; margin: 0; }
h1 { font-size: 20pt; margin: 0 0 4pt 0; }
h2 { font-size: 15pt; margin: 14pt 0 6pt 0; border-bottom: 1px solid #444; }
.subtitle { font-size: 12pt; margin: 0 0 8pt 0; }
.name-date { display: flex; justify-content: space-between; margin: 10pt 0 12pt 0; }
.name-date span { display: inline-block; width: 46%; border-bottom: 1px solid #000; padding-bottom: 2pt; }
.instructions { font-style: italic; margin: 6pt 0; }
.question { margin: 10pt 0; page-break-inside: avoid; break-inside: avoid; }
.question-number { font-weight: bold; margin-right: 4pt; }
.choices { list-style: none; padding-left: 18pt; margin: 4pt 0; }
.choices li { margin: 3pt 0; }
.bubble { display: inline-block; min-width: 16pt; height: 16pt; border: 1px solid #000; border-radius: 8pt; text-align: center; font-size: 10pt; line-height: 16pt; margin-right: 6pt; padding: 0 3pt; }
.answer-line { border-bottom: 1px solid #000; height: 22pt; margin: 4pt 0 0 18pt; }
.work-box { border: 1px solid #000; height: 110pt; margin: 6pt 0 0 18pt; }
.drawing-box { border: 1px dashed #000; height: 150pt; margin: 6pt 0 0 18pt; }
.drawing-label { font-size: 10pt; padding: 4pt; }
figure.illustration { margin: 8pt 0 8pt 18pt; page-break-inside: avoid; break-inside: avoid; }
figure.illustration img { max-width: 100%; height: auto; }
.answer-key .answer { margin: 6pt 0; }
.explanation { font-size: 11pt; margin: 2pt 0 0 18pt; }
.checkbox { display: inline-block; width: 12pt; height: 12pt; border: 1px solid #000; margin-right: 6pt; }
.materials li { list-style: none; margin: 4pt 0; }
.script-entry { margin: 6pt 0; }
.cue { font-weight: bold; margin-right: 4pt; }
.timing { font-size: 10pt; color: #444; }
footer.generated { margin-top: 18pt; font-size: 9pt; color: #444; }
"#;

/// Wrap `body` in a complete, self-contained HTML document.
pub fn document(title: &str, body: &str, generated_at: Option<DateTime<Utc>>) -> String {
    let mut html = String::with_capacity(body.len() + PRINT_CSS.len() + 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str("<style>");
    html.push_str(PRINT_CSS);
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str(body);
    if let Some(ts) = generated_at {
        html.push_str(&format!(
            "<footer class=\"generated\">Generated {}</footer>\n",
            ts.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn escapes_all_special_characters() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn escape_leaves_plain_text_alone() {
        assert_eq!(escape_html("2 + 3 = 5"), "2 + 3 = 5");
    }

    #[test]
    fn document_is_self_contained() {
        let html = document("Test", "<p>hi</p>\n", None);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<style>"));
        assert!(html.contains("@page"));
        assert!(!html.contains("<link"));
        assert!(!html.contains("Generated"));
    }

    #[test]
    fn document_embeds_timestamp_when_given() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let html = document("Test", "", Some(ts));
        assert!(html.contains("Generated 2026-03-14 09:30 UTC"));
    }
}
