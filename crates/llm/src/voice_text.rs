//! Cleanup of generated text for spoken playback

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*").unwrap());
static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"#{1,6}\s").unwrap());
static CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`{1,3}").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static BULLETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[•●○■□]").unwrap());

/// Strip markdown and odd glyphs so the answer reads cleanly aloud
pub fn clean_for_voice(text: &str) -> String {
    let text = BOLD.replace_all(text, "");
    let text = ITALIC.replace_all(&text, "");
    let text = HEADER.replace_all(&text, "");
    let text = CODE.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    let text = BULLETS.replace_all(&text, "-");
    text.trim().to_string()
}
