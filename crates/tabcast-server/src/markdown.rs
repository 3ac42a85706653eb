//! HTML → Markdown conversion boundary.
//!
//! Purely functional: accepts raw markup and a named strategy, returns the
//! transformed text plus structural metadata, or a failure reason. No state
//! crosses calls.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Rendering width passed to the HTML renderer; wide enough that normal
/// prose is never wrapped.
const RENDER_WIDTH: usize = 10_000;

static NOISE_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>")
        .expect("static regex is valid")
});
static HTML_COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex is valid"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex is valid"));

static HEADINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h[1-6][\s>]").expect("static regex is valid"));
static LINKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<a[\s>]").expect("static regex is valid"));
static IMAGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img[\s>/]").expect("static regex is valid"));
static TABLES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<table[\s>]").expect("static regex is valid"));
static CODE_BLOCKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<pre[\s>]").expect("static regex is valid"));

/// Conversion strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Line-oriented plain text, decorations stripped.
    Text,
    /// Markdown with emphasis and link targets preserved.
    Rich,
    /// Try [`Strategy::Rich`] first, fall back to [`Strategy::Text`].
    Auto,
}

impl FromStr for Strategy {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "rich" => Ok(Self::Rich),
            "auto" => Ok(Self::Auto),
            other => Err(ConvertError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Conversion failure reasons.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("empty HTML content")]
    EmptyInput,

    #[error("unknown conversion strategy: {0}")]
    UnknownStrategy(String),

    #[error("HTML rendering failed: {0}")]
    Render(#[from] html2text::Error),
}

/// Structural metadata extracted from the source markup.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DocMetadata {
    pub headings: usize,
    pub links: usize,
    pub images: usize,
    pub tables: usize,
    pub code_blocks: usize,
}

/// A successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub markdown: String,
    pub length: usize,
    pub lines: usize,
    pub metadata: DocMetadata,
}

/// Convert `html` to Markdown-flavoured text.
///
/// With `clean` set, scripts, styles, and comments are stripped before
/// rendering so they cannot leak into the output.
pub fn convert(html: &str, strategy: Strategy, clean: bool) -> Result<Conversion, ConvertError> {
    if html.trim().is_empty() {
        return Err(ConvertError::EmptyInput);
    }

    let cleaned = if clean {
        clean_html(html)
    } else {
        html.to_string()
    };

    let rendered = match strategy {
        Strategy::Text => render_plain(&cleaned)?,
        Strategy::Rich => render_rich(&cleaned)?,
        Strategy::Auto => render_rich(&cleaned).or_else(|_| render_plain(&cleaned))?,
    };

    let markdown = post_process(&rendered);
    let metadata = extract_metadata(&cleaned);

    Ok(Conversion {
        length: markdown.len(),
        lines: markdown.lines().count(),
        markdown,
        metadata,
    })
}

fn render_rich(html: &str) -> Result<String, ConvertError> {
    Ok(html2text::config::rich().string_from_read(html.as_bytes(), RENDER_WIDTH)?)
}

fn render_plain(html: &str) -> Result<String, ConvertError> {
    Ok(html2text::config::plain().string_from_read(html.as_bytes(), RENDER_WIDTH)?)
}

fn clean_html(html: &str) -> String {
    let without_noise = NOISE_BLOCKS.replace_all(html, "");
    HTML_COMMENTS.replace_all(&without_noise, "").into_owned()
}

/// Trim trailing whitespace per line and collapse runs of blank lines.
fn post_process(rendered: &str) -> String {
    let trimmed: Vec<&str> = rendered.lines().map(str::trim_end).collect();
    let joined = trimmed.join("\n");
    BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

fn extract_metadata(html: &str) -> DocMetadata {
    DocMetadata {
        headings: HEADINGS.find_iter(html).count(),
        links: LINKS.find_iter(html).count(),
        images: IMAGES.find_iter(html).count(),
        tables: TABLES.find_iter(html).count(),
        code_blocks: CODE_BLOCKS.find_iter(html).count(),
    }
}
