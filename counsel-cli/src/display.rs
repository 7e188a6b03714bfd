//! Terminal rendering of turn fragments.
//!
//! Fragments are HTML. This converts them to plain terminal text as they
//! stream: tags become line breaks or spacing, entities are decoded, and a
//! tag or entity split across fragments is held until it completes.

mod ansi {
    pub const BOLD_ON: &str = "\x1b[1m";
    pub const BOLD_OFF: &str = "\x1b[22m";
    pub const DIM_ON: &str = "\x1b[2m";
    pub const DIM_OFF: &str = "\x1b[22m";
}

use counsel_core::Fragment;

const MAX_ENTITY_LEN: usize = 8;

#[derive(Debug, Default)]
pub struct HtmlToTerminal {
    tag: Option<String>,
    entity: Option<String>,
    color: bool,
}

impl HtmlToTerminal {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// Render one fragment. Tool blocks and notices start on a fresh line
    /// and are dimmed.
    pub fn fragment(&mut self, fragment: &Fragment) -> String {
        match fragment {
            Fragment::Text(html) => self.feed(html),
            Fragment::ToolBlock(html) | Fragment::Notice(html) => {
                let body = self.feed(html);
                let body = body.trim_end();
                if self.color {
                    format!("\n{}{body}{}\n", ansi::DIM_ON, ansi::DIM_OFF)
                } else {
                    format!("\n{body}\n")
                }
            }
        }
    }

    pub fn feed(&mut self, html: &str) -> String {
        let mut out = String::new();
        for ch in html.chars() {
            if let Some(tag) = self.tag.as_mut() {
                if ch == '>' {
                    let tag = std::mem::take(tag);
                    self.tag = None;
                    out.push_str(&self.tag_text(&tag));
                } else {
                    tag.push(ch);
                }
                continue;
            }
            if let Some(entity) = self.entity.as_mut() {
                if ch == ';' {
                    let entity = std::mem::take(entity);
                    self.entity = None;
                    out.push_str(&decode_entity(&entity));
                    continue;
                }
                if ch.is_ascii_alphanumeric() || ch == '#' {
                    entity.push(ch);
                    if entity.len() <= MAX_ENTITY_LEN {
                        continue;
                    }
                }
                // Not an entity after all.
                out.push('&');
                out.push_str(&std::mem::take(entity));
                self.entity = None;
                if ch.is_ascii_alphanumeric() || ch == '#' {
                    continue;
                }
            }
            match ch {
                '<' => self.tag = Some(String::new()),
                '&' => self.entity = Some(String::new()),
                _ => out.push(ch),
            }
        }
        out
    }

    /// Emit anything still buffered at the end of a turn.
    pub fn flush(&mut self) -> String {
        let mut out = String::new();
        if let Some(entity) = self.entity.take() {
            out.push('&');
            out.push_str(&entity);
        }
        if let Some(tag) = self.tag.take() {
            out.push('<');
            out.push_str(&tag);
        }
        out
    }

    fn tag_text(&self, tag: &str) -> String {
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let closing = tag.starts_with('/');
        let bold = |on: bool| {
            if !self.color {
                String::new()
            } else if on {
                ansi::BOLD_ON.to_string()
            } else {
                ansi::BOLD_OFF.to_string()
            }
        };
        match (name.as_str(), closing) {
            ("br", _) => "\n".into(),
            ("p" | "div" | "tr" | "li" | "table" | "details" | "ul" | "pre", true) => "\n".into(),
            ("h1" | "h2" | "h3" | "h4" | "summary", false) => format!("\n{}", bold(true)),
            ("h1" | "h2" | "h3" | "h4" | "summary", true) => format!("{}\n", bold(false)),
            ("strong" | "b" | "th", false) => bold(true),
            ("strong" | "b" | "th", true) => bold(false),
            ("td" | "th", _) if closing => "  ".into(),
            ("li", false) => "- ".into(),
            _ => String::new(),
        }
    }
}

fn decode_entity(entity: &str) -> String {
    match entity {
        "amp" => "&".into(),
        "lt" => "<".into(),
        "gt" => ">".into(),
        "quot" => "\"".into(),
        "apos" | "#39" | "#x27" => "'".into(),
        "nbsp" => " ".into(),
        other => other
            .strip_prefix('#')
            .and_then(|n| n.parse::<u32>().ok())
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| format!("&{other};")),
    }
}
