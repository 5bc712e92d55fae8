
use anyhow::Context;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::database::models::Metadata;
use crate::{Result, RetrievalError};

const SOURCE_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];
const FRONT_MATTER_FENCE: &str = "---";

/// One file from the content directory, reduced to plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub source_path: String,
    pub metadata: Metadata,
    pub text: String,
    stem: String,
}

impl SourceDocument {
    #[inline]
    pub fn new(source_path: &Path, metadata: Metadata, text: String) -> Self {
        let stem = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            source_path: source_path.display().to_string(),
            metadata,
            text,
            stem,
        }
    }

    /// The front-matter `title`, else the file stem
    #[inline]
    pub fn title(&self) -> &str {
        self.metadata
            .get("title")
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.stem)
    }
}

/// Every Markdown or plain-text file under `content_dir`, sorted by path
#[inline]
pub fn list_source_files(content_dir: &Path) -> Result<Vec<PathBuf>> {
    if !content_dir.is_dir() {
        return Err(RetrievalError::ConfigInvalid(format!(
            "Content directory does not exist: {}",
            content_dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(content_dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", content_dir.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() && has_source_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    debug!("Found {} source files in {}", files.len(), content_dir.display());
    Ok(files)
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Read a file, split off its front matter, and flatten the body to plain text
#[inline]
pub fn read_source(path: &Path) -> Result<SourceDocument> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file: {}", path.display()))?;

    let (metadata, body) = split_front_matter(&raw);
    let is_plain_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

    let text = if is_plain_text {
        collapse_whitespace(body)
    } else {
        markdown_to_text(body)
    };

    Ok(SourceDocument::new(path, metadata, text))
}

/// Parse a leading `---` block of `key: value` lines.
///
/// Returns the metadata and the remaining body. Without a closing fence the whole input is body.
#[inline]
pub fn split_front_matter(raw: &str) -> (Metadata, &str) {
    let mut metadata = Metadata::new();

    let Some(rest) = raw.strip_prefix(FRONT_MATTER_FENCE) else {
        return (metadata, raw);
    };
    let Some(rest) = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
    else {
        return (metadata, raw);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let line = line.trim();

        if line == FRONT_MATTER_FENCE {
            return (metadata, rest.get(offset..).unwrap_or_default());
        }

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                metadata.insert(key.to_string(), unquote(value.trim()).to_string());
            }
        }
    }

    (Metadata::new(), raw)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Flatten Markdown to whitespace-normalized prose.
///
/// Code blocks, images and raw HTML are dropped. Links keep their text. Inline code keeps its
/// contents without backticks.
#[inline]
pub fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::with_capacity(markdown.len());
    let mut in_code_block = false;
    let mut image_depth = 0_usize;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                text.push(' ');
            }
            Event::Start(Tag::Image { .. }) => image_depth += 1,
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            Event::Text(content) | Event::Code(content) => {
                if !in_code_block && image_depth == 0 {
                    text.push_str(&content);
                }
            }
            Event::SoftBreak | Event::HardBreak | Event::Rule => text.push(' '),
            Event::Html(_) | Event::InlineHtml(_) => text.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::BlockQuote(_)
                | TagEnd::TableCell,
            ) => text.push(' '),
            _ => {}
        }
    }

    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
