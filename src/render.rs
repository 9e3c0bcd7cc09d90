// ABOUTME: Slide rendering module for the carousel pipeline
// ABOUTME: Binds slide content into template markup, producing deterministic HTML

use crate::errors::GenerationError;
use crate::model::{ContentPayload, SlideContent, SlideTemplate, StyleMap};
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

const VIDEO_EXTENSIONS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    ("ogv", "video/ogg"),
];

const COVER_STYLE: &str =
    "position:absolute;top:0;left:0;width:100%;height:100%;object-fit:cover;";

/// Markup of the self-contained slide used when no remote template exists.
const BUILTIN_MARKUP: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=1080, initial-scale=1.0">
<style>
* { margin: 0; padding: 0; box-sizing: border-box; }
body { width: 1080px; height: 1350px; overflow: hidden; position: relative; background: #000; }
.slide-background { z-index: 0; }
.overlay { position: absolute; top: 0; left: 0; width: 100%; height: 100%; background: linear-gradient(to top, rgba(0,0,0,0.8) 0%, rgba(0,0,0,0.4) 50%, transparent 100%); z-index: 1; }
.content { position: absolute; bottom: 80px; left: 60px; right: 60px; z-index: 2; color: white; }
.title { font-size: 48px; font-weight: bold; line-height: 1.2; margin-bottom: 20px; text-shadow: 2px 2px 8px rgba(0,0,0,0.8); }
.subtitle { font-size: 28px; line-height: 1.4; opacity: 0.9; text-shadow: 1px 1px 4px rgba(0,0,0,0.8); }
.thumbnail { position: absolute; top: 40px; right: 40px; width: 120px; height: 120px; border-radius: 12px; overflow: hidden; border: 3px solid rgba(255,255,255,0.2); z-index: 2; }
.thumbnail img { width: 100%; height: 100%; object-fit: cover; }
[data-editable] { cursor: text; transition: outline 0.2s; }
</style>
{{element_styles}}
</head>
<body style="{{style}}">
{{background}}
<div class="overlay"></div>
{{thumbnail}}
<div class="content">
{{title}}
{{subtitle}}
</div>
</body>
</html>"#;

impl SlideTemplate {
    /// Built-in standalone slide layout.
    pub fn builtin() -> Self {
        Self {
            markup: BUILTIN_MARKUP.to_string(),
            style: StyleMap::new(),
        }
    }
}

/// Render every slide of `content` against `templates`.
///
/// Produces exactly one slide per entry of `content.slide_contents`, in order.
/// Indices past the end of `templates` reuse the last template. An empty
/// template list is reported as `TemplateUnavailable`.
pub fn render_all_slides(
    templates: &[SlideTemplate],
    content: &ContentPayload,
) -> Result<Vec<String>, GenerationError> {
    let Some(last) = templates.last() else {
        return Err(GenerationError::TemplateUnavailable {
            template_id: content.template_id().to_string(),
            reason: "template defines no slides".to_string(),
        });
    };

    let mut slides = Vec::with_capacity(content.slide_contents.len());
    for (index, slide) in content.slide_contents.iter().enumerate() {
        let template = templates.get(index).unwrap_or(last);
        let overrides = content.style_overrides.get(&index);
        slides.push(render_slide(template, slide, overrides, index));
    }

    Ok(slides)
}

/// Render a single slide.
pub fn render_slide(
    template: &SlideTemplate,
    slide: &SlideContent,
    overrides: Option<&StyleMap>,
    index: usize,
) -> String {
    let style = merge_styles(&template.style, overrides);

    bind_placeholders(&template.markup, |name| match name {
        "title" => Some(text_node(index, "title", slide.title.as_deref())),
        "subtitle" => Some(text_node(index, "subtitle", slide.subtitle.as_deref())),
        "background" => Some(background_node(slide.background_url.as_deref())),
        "thumbnail" => Some(thumbnail_node(slide.thumbnail_url.as_deref())),
        "style" => Some(escape_html(&inline_css(&style))),
        "element_styles" => Some(element_style_block(&style)),
        "index" => Some(index.to_string()),
        _ => None,
    })
}

/// Shallow merge: every top-level property of the override replaces the
/// template default of the same name.
pub fn merge_styles(base: &StyleMap, overrides: Option<&StyleMap>) -> StyleMap {
    let mut merged = base.clone();
    if let Some(patch) = overrides {
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Whether a media URL points at a video file, judged by its path extension.
pub fn is_video_url(media_url: &str) -> bool {
    video_mime_type(media_url).is_some()
}

fn video_mime_type(media_url: &str) -> Option<&'static str> {
    let path = match Url::parse(media_url) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative or otherwise unparseable URLs: drop query and fragment by hand
        Err(_) => media_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let file_name = path.rsplit('/').next()?;
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();

    VIDEO_EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

/// Replace every `{{name}}` marker in one left-to-right pass. Markers the
/// resolver does not know are kept verbatim; substituted text is never
/// rescanned.
fn bind_placeholders<F>(markup: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut output = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            output.push_str(&rest[start..]);
            return output;
        };

        let name = after_open[..end].trim();
        match resolve(name) {
            Some(value) => output.push_str(&value),
            None => output.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    output.push_str(rest);
    output
}

fn text_node(index: usize, element: &str, text: Option<&str>) -> String {
    match text.map(str::trim) {
        Some(text) if !text.is_empty() => format!(
            r#"<div id="slide-{index}-{element}" class="{element}" data-editable="true" data-element="{element}">{}</div>"#,
            escape_html(text)
        ),
        _ => String::new(),
    }
}

fn background_node(media_url: Option<&str>) -> String {
    let Some(media_url) = media_url.map(str::trim).filter(|u| !u.is_empty()) else {
        return String::new();
    };
    let src = escape_html(media_url);

    match video_mime_type(media_url) {
        Some(mime) => format!(
            r#"<video autoplay loop muted playsinline class="slide-background" style="{COVER_STYLE}"><source src="{src}" type="{mime}"></video>"#
        ),
        None => format!(
            r#"<img src="{src}" alt="Background" class="slide-background" style="{COVER_STYLE}" />"#
        ),
    }
}

fn thumbnail_node(thumbnail_url: Option<&str>) -> String {
    match thumbnail_url.map(str::trim) {
        Some(url) if !url.is_empty() => format!(
            r#"<div class="thumbnail"><img src="{}" alt="Thumbnail" /></div>"#,
            escape_html(url)
        ),
        _ => String::new(),
    }
}

/// Scalar properties as a `prop: value;` declaration list.
fn inline_css(style: &StyleMap) -> String {
    let declarations: Vec<String> = style
        .iter()
        .filter_map(|(key, value)| css_scalar(value).map(|v| format!("{}: {};", css_property(key), v)))
        .collect();
    declarations.join(" ")
}

/// Object-valued properties become rules scoped to the named element.
fn element_style_block(style: &StyleMap) -> String {
    let mut rules = Vec::new();
    for (element, value) in style {
        let Value::Object(properties) = value else {
            continue;
        };
        let declarations: BTreeMap<String, String> = properties
            .iter()
            .filter_map(|(key, value)| css_scalar(value).map(|v| (css_property(key), v)))
            .collect();
        if declarations.is_empty() {
            continue;
        }

        let body: Vec<String> = declarations
            .iter()
            .map(|(prop, value)| format!("{}: {};", prop, value))
            .collect();
        rules.push(format!(
            "[data-element=\"{}\"] {{ {} }}",
            sanitize_css(element),
            body.join(" ")
        ));
    }

    if rules.is_empty() {
        String::new()
    } else {
        format!("<style>\n{}\n</style>", rules.join("\n"))
    }
}

fn css_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(sanitize_css(s.trim())),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// camelCase editor keys (`fontSize`) to CSS property names (`font-size`).
fn css_property(key: &str) -> String {
    let mut property = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            property.push('-');
            property.push(ch.to_ascii_lowercase());
        } else {
            property.push(ch);
        }
    }
    sanitize_css(&property)
}

fn sanitize_css(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '{' | '}' | ';'))
        .collect()
}

/// Escape text for use in HTML content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
