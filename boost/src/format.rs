//! Status and artifact rendering for the response stream.

use config::StatusStyle;
use regex::Regex;

/// Renders a status string according to the configured style.
pub fn format_status(style: StatusStyle, status: &str) -> String {
    match style {
        StatusStyle::MdCodeblock => format!("\n```boost\n{status}\n```\n"),
        StatusStyle::MdH1 => format!("\n\n# {status}\n\n"),
        StatusStyle::MdH2 => format!("\n\n## {status}\n\n"),
        StatusStyle::MdH3 => format!("\n\n### {status}\n\n"),
        StatusStyle::Plain => format!("\n\n{status}\n\n"),
        StatusStyle::None => String::new(),
    }
}

/// Artifacts are always framed as an HTML code block.
pub fn format_artifact(artifact: &str) -> String {
    format!("\n```html\n{artifact}\n```\n")
}

/// Removes all ```` ```html … ``` ```` code blocks from a string.
pub fn remove_html_code_blocks(text: &str) -> String {
    match Regex::new(r"(?s)```html\n(.*?)\n```") {
        Ok(re) => re.replace_all(text, "").into_owned(),
        Err(_) => text.to_string(),
    }
}
