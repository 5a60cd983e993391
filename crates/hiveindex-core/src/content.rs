//! Post body and metadata normalisation.
//!
//! [`render_body`] turns a raw markdown body into indexable plain text plus
//! the image URLs it embeds. Newlines survive tokenisation as the explicit
//! marker ` \n `.

use std::sync::OnceLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde_json::Value;

/// Plain-text rendering of a markdown body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedBody {
    /// Text with all markup stripped and newlines replaced by ` \n `.
    pub text: String,
    /// Image URLs referenced by the body, in order of appearance.
    pub images: Vec<String>,
}

fn img_src_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("static regex")
    })
}

fn br_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("static regex"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

/// Render `markdown` to plain text and collect embedded image URLs.
pub fn render_body(markdown: &str) -> RenderedBody {
    let mut text = String::with_capacity(markdown.len());
    let mut images = Vec::new();
    // Alt text of an image is an attribute, not body text.
    let mut image_depth = 0usize;

    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::Image { dest_url, .. }) => {
                image_depth += 1;
                push_unique(&mut images, dest_url.to_string());
            }
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            Event::Text(t) | Event::Code(t) if image_depth == 0 => text.push_str(&t),
            Event::Html(html) | Event::InlineHtml(html) => {
                for cap in img_src_regex().captures_iter(&html) {
                    push_unique(&mut images, cap[1].to_string());
                }
                if image_depth == 0 {
                    let html = br_regex().replace_all(&html, "\n");
                    text.push_str(&tag_regex().replace_all(&html, ""));
                }
            }
            Event::SoftBreak | Event::HardBreak => line_break(&mut text),
            Event::End(TagEnd::TableCell) => text.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => line_break(&mut text),
            _ => {}
        }
    }

    RenderedBody {
        text: text.trim_end().replace('\n', " \n "),
        images,
    }
}

/// End the current line, dropping the cell separators left before it.
fn line_break(text: &mut String) {
    text.truncate(text.trim_end_matches(' ').len());
    text.push('\n');
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// The parts of a post's `json_metadata` the index cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostMetadata {
    pub tags: Vec<String>,
    pub image: Vec<String>,
}

impl PostMetadata {
    /// Parse leniently: invalid JSON or wrongly-shaped fields yield empty lists.
    pub fn parse(raw: &str) -> Self {
        let value: Value = serde_json::from_str(raw).unwrap_or(Value::Null);
        Self {
            tags: string_list(value.get("tags")),
            image: string_list(value.get("image")),
        }
    }

    /// Append images found in the body that the metadata does not list yet.
    pub fn merge_images(&mut self, images: &[String]) {
        for img in images {
            push_unique(&mut self.image, img.clone());
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Collect `#tag` tokens from `text`, strip the marker and join with spaces.
pub fn hashtags(text: &str) -> String {
    text.split_whitespace()
        .filter_map(|token| token.strip_prefix('#'))
        .filter(|tag| !tag.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
