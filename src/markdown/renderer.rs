//! Markdown rendering with GitHub Flavored Markdown support.

use anyhow::{Context, Result};
use comrak::Options;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Renders markdown to HTML with GitHub Flavored Markdown extensions.
///
/// Provides GFM extensions including tables, strikethrough, autolinks,
/// task lists, footnotes, and description lists. Headings receive slug ids
/// with a permalink anchor. Uses syntect for code block syntax highlighting
/// when language is specified.
pub struct MarkdownRenderer<'a> {
    options: Options<'a>,
    syntax_set: SyntaxSet,
}

impl<'a> MarkdownRenderer<'a> {
    /// Creates renderer with GitHub Flavored Markdown options.
    ///
    /// Configures all GFM extensions and rendering settings:
    /// - Tables, strikethrough, autolinks, task lists, footnotes
    /// - Heading ids for permalinks and the table of contents
    /// - Smart punctuation for quotes and dashes
    /// - Raw HTML passthrough (repository documentation is trusted)
    /// - Syntax highlighting with syntect using CSS classes
    pub fn new() -> Self {
        let mut options = Options::default();

        // Extension options (GFM features)
        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;
        options.extension.footnotes = true;
        options.extension.description_lists = true;
        options.extension.header_ids = Some(String::new());

        // Parse options (smart punctuation)
        options.parse.smart = true;

        // Render options (documentation embeds raw <img> tags)
        options.render.unsafe_ = true;

        // Load syntax definitions for highlighting
        let syntax_set = SyntaxSet::load_defaults_newlines();

        Self {
            options,
            syntax_set,
        }
    }

    /// Renders markdown content to HTML string.
    ///
    /// Parses markdown into AST and renders to HTML with GFM extensions.
    /// Code blocks are syntax highlighted with CSS class names using syntect.
    ///
    /// # Arguments
    ///
    /// * `content`: Markdown content to render
    ///
    /// # Returns
    ///
    /// Rendered HTML fragment with syntax highlighted code blocks
    ///
    /// # Errors
    ///
    /// Returns error if syntax highlighting fails
    pub fn render(&self, content: &str) -> Result<String> {
        let html = comrak::markdown_to_html(content, &self.options);

        // Post-process HTML to add syntax highlighting with CSS classes
        self.highlight_code_blocks(&html)
    }

    /// Replaces `<code class="language-X">` block contents with syntect
    /// output using `hljs-` prefixed CSS classes.
    ///
    /// Blocks whose markup cannot be delimited are copied unchanged.
    fn highlight_code_blocks(&self, html: &str) -> Result<String> {
        const OPEN: &str = "<code class=\"language-";
        const CLOSE: &str = "</code>";

        let mut result = String::with_capacity(html.len());
        let mut copied = 0;
        let mut cursor = 0;

        while let Some(found) = html[cursor..].find(OPEN) {
            let open_at = cursor + found;
            let lang_at = open_at + OPEN.len();

            let Some((language, body_at)) = html[lang_at..].find('"').and_then(|q| {
                let lang_end = lang_at + q;
                html[lang_end..]
                    .find('>')
                    .map(|g| (&html[lang_at..lang_end], lang_end + g + 1))
            }) else {
                cursor = open_at + 1;
                continue;
            };

            let Some(body_end) = html[body_at..].find(CLOSE).map(|p| body_at + p) else {
                cursor = open_at + 1;
                continue;
            };

            let code = decode_entities(&html[body_at..body_end]);
            let highlighted = self
                .highlight_code(&code, language)
                .with_context(|| format!("Failed to highlight {} code block", language))?;

            result.push_str(&html[copied..open_at]);
            result.push_str(OPEN);
            result.push_str(language);
            result.push_str("\">");
            result.push_str(&highlighted);
            result.push_str(CLOSE);

            copied = body_end + CLOSE.len();
            cursor = copied;
        }

        result.push_str(&html[copied..]);
        Ok(result)
    }

    /// Highlights code for `language`, escaping it verbatim when syntect has
    /// no definition for the token.
    fn highlight_code(&self, code: &str, language: &str) -> Result<String> {
        if code.is_empty() {
            return Ok(String::new());
        }

        let Some(syntax) = self
            .syntax_set
            .find_syntax_by_token(language)
            .or_else(|| self.syntax_set.find_syntax_by_extension(language))
        else {
            return Ok(encode_entities(code));
        };

        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntax_set,
            ClassStyle::SpacedPrefixed { prefix: "hljs-" },
        );

        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .context("Failed to parse line for syntax highlighting")?;
        }

        Ok(generator.finalize())
    }
}

impl<'a> Default for MarkdownRenderer<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reverses the entity escaping comrak applies inside code blocks.
fn decode_entities(html: &str) -> String {
    html.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn encode_entities(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
