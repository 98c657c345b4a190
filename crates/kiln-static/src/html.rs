//! HTML whitespace minification for production builds.

use std::sync::LazyLock;

use regex::Regex;

/// Blocks whose whitespace is significant.
static PRESERVED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<pre\b.*?</pre>|<textarea\b.*?</textarea>|<script\b.*?</script>|<style\b.*?</style>")
        .expect("Invalid preserved block regex")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Collapse runs of whitespace to a single space, leaving `<pre>`,
/// `<textarea>`, `<script>` and `<style>` blocks untouched.
pub fn minify_html(html: &str) -> String {
    let mut output = String::with_capacity(html.len());
    let mut last = 0;

    for block in PRESERVED_RE.find_iter(html) {
        output.push_str(&WHITESPACE_RE.replace_all(&html[last..block.start()], " "));
        output.push_str(block.as_str());
        last = block.end();
    }
    output.push_str(&WHITESPACE_RE.replace_all(&html[last..], " "));

    output.trim().to_string()
}
