//! Markdown to HTML conversion boundary.
//!
//! The pipeline only needs "text and title in, HTML out, possibly failing",
//! so that is all [`Renderer`] asks for. [`CommandRenderer`] hands the work
//! to an external converter process, [`BuiltinRenderer`] does it in process,
//! and plain closures work too, which keeps tests free of subprocesses.

use regex::Regex;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use thiserror::Error;

use crate::markdown::MarkdownRenderer;
use crate::template;

/// Environment variable carrying the page title to external converters.
pub const TITLE_ENV: &str = "DOCBRANCH_TITLE";

static FIRST_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*\r?$").expect("valid regex"));

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to start renderer {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("renderer produced invalid UTF8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("rendering failed: {0}")]
    Markdown(String),
}

/// Converts one Markdown document to a complete HTML page.
pub trait Renderer {
    fn render(&self, markdown: &str, title: &str) -> Result<String, RenderError>;
}

impl<F> Renderer for F
where
    F: Fn(&str, &str) -> Result<String, RenderError>,
{
    fn render(&self, markdown: &str, title: &str) -> Result<String, RenderError> {
        self(markdown, title)
    }
}

/// Derives a page title from the first `# ` heading or the file name.
pub fn document_title(path: &Path, content: &str) -> String {
    if let Some(caps) = FIRST_HEADING.captures(content) {
        return caps[1].to_string();
    }

    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Runs an external converter once per document.
///
/// The Markdown text is written to the child's stdin, the title is exported
/// as [`TITLE_ENV`], and whatever the child prints on stdout is the page.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, markdown: &str, title: &str) -> Result<String, RenderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(TITLE_ENV, title)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // Feed stdin from a separate thread so a child that streams output
        // before draining its input cannot block on a full pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = markdown.to_owned();
            std::thread::spawn(move || stdin.write_all(input.as_bytes()))
        });

        let output = child.wait_with_output()?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // Children that ignore stdin close the pipe early.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(RenderError::Io(e)),
                Err(_) => {
                    return Err(RenderError::Io(std::io::Error::other(
                        "stdin writer panicked",
                    )));
                }
            }
        }

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

/// In process renderer producing a styled, self-contained page.
///
/// Adds heading anchors and a table of contents for level 2 and 3 headings.
pub struct BuiltinRenderer<'a> {
    markdown: MarkdownRenderer<'a>,
}

impl<'a> BuiltinRenderer<'a> {
    pub fn new() -> Self {
        Self {
            markdown: MarkdownRenderer::new(),
        }
    }
}

impl<'a> Default for BuiltinRenderer<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Renderer for BuiltinRenderer<'a> {
    fn render(&self, markdown: &str, title: &str) -> Result<String, RenderError> {
        let body = self
            .markdown
            .render(markdown)
            .map_err(|e| RenderError::Markdown(format!("{:#}", e)))?;
        let toc = crate::markdown::table_of_contents(&body);

        Ok(template::page(title, &toc, &body).into_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_first_heading() {
        // Arrange
        let content = "Intro line\n\n## Not this\n# Getting Started  \n# Second\n";

        // Act
        let title = document_title(Path::new("guide/start.md"), content);

        // Assert
        assert_eq!(title, "Getting Started");
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        // Arrange
        let content = "## Only second level\n\nText.";

        // Act
        let title = document_title(Path::new("guide/install-notes.md"), content);

        // Assert
        assert_eq!(title, "install-notes");
    }

    #[test]
    fn test_title_ignores_hashtag_without_space() {
        // Act
        let title = document_title(Path::new("notes.md"), "#hashtag\n");

        // Assert
        assert_eq!(title, "notes");
    }

    #[test]
    fn test_closure_renderer() {
        // Arrange
        let renderer = |md: &str, title: &str| -> Result<String, RenderError> {
            Ok(format!("<title>{}</title>{}", title, md.len()))
        };

        // Act
        let html = renderer.render("abc", "T").expect("Closure should render");

        // Assert
        assert_eq!(html, "<title>T</title>3");
    }

    #[test]
    fn test_builtin_renderer_wraps_page() {
        // Arrange
        let renderer = BuiltinRenderer::new();
        let markdown = "# Guide\n\n## Install\n\nRun it.\n\n### Linux\n\nText.\n";

        // Act
        let html = renderer.render(markdown, "Guide").expect("Should render");

        // Assert
        assert!(html.starts_with("<!DOCTYPE html>"), "Should be a full page");
        assert!(html.contains("<title>Guide</title>"), "Should set title: {}", html);
        assert!(html.contains("Table of Contents"), "Should contain TOC: {}", html);
        assert!(html.contains("href=\"#install\""), "Should link section: {}", html);
        assert!(html.contains("href=\"#linux\""), "Should link subsection: {}", html);
        assert!(html.contains("Run it."), "Should contain body");
    }

    #[test]
    fn test_builtin_renderer_without_sections_has_no_toc() {
        // Arrange
        let renderer = BuiltinRenderer::new();

        // Act
        let html = renderer
            .render("# Title\n\nJust text.", "Title")
            .expect("Should render");

        // Assert
        assert!(!html.contains("Table of Contents"), "No TOC expected: {}", html);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_renderer_passes_stdin_and_title() {
        // Arrange
        let renderer = CommandRenderer::new("sh").args([
            "-c",
            "printf '<h1>%s</h1>' \"$DOCBRANCH_TITLE\"; cat",
        ]);

        // Act
        let html = renderer
            .render("body text", "My Title")
            .expect("Command should succeed");

        // Assert
        assert_eq!(html, "<h1>My Title</h1>body text");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_renderer_large_input() {
        // Arrange
        let renderer = CommandRenderer::new("cat");
        let markdown = "line of documentation text\n".repeat(50_000);

        // Act
        let html = renderer.render(&markdown, "Big").expect("cat should echo");

        // Assert
        assert_eq!(html.len(), markdown.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_renderer_non_zero_exit() {
        // Arrange
        let renderer = CommandRenderer::new("sh").args(["-c", "echo broken >&2; exit 3"]);

        // Act
        let err = renderer.render("x", "t").expect_err("Exit 3 should fail");

        // Assert
        match err {
            RenderError::Failed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_command_renderer_missing_program() {
        // Arrange
        let renderer = CommandRenderer::new("docbranch-no-such-converter");

        // Act
        let err = renderer.render("x", "t").expect_err("Spawn should fail");

        // Assert
        assert!(matches!(err, RenderError::Spawn { .. }), "Got {:?}", err);
    }
}
