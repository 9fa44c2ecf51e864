//! Display templates: `{field}` and `{field:[[fill]align][width][.precision]}`
//!
//! Sizes in a placeholder spec are passed through a [`WidthResolver`] when
//! rendering, so list columns can scale with the viewport.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{(\w*)(?::([^{}]*))?\}").expect("placeholder pattern is valid")
    })
}

/// Maps a size written in a template to the size actually rendered
pub trait WidthResolver {
    fn resolve(&self, size: usize) -> usize;
}

/// Sizes are used as written
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsoluteWidths;

impl WidthResolver for AbsoluteWidths {
    fn resolve(&self, size: usize) -> usize {
        size
    }
}

/// Sizes are percentages of the viewport width, rounded half to even
#[derive(Debug, Clone, Copy)]
pub struct ViewportPercent {
    pub viewport_width: usize,
}

impl WidthResolver for ViewportPercent {
    fn resolve(&self, size: usize) -> usize {
        let columns = self.viewport_width.saturating_mul(size) as f64 / 100.0;
        columns.round_ties_even() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

impl Align {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(Self::Left),
            '>' => Some(Self::Right),
            '^' => Some(Self::Center),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    pub fill: char,
    pub align: Align,
    pub width: Option<usize>,
    pub precision: Option<usize>,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            fill: ' ',
            align: Align::Left,
            width: None,
            precision: None,
        }
    }
}

impl FormatSpec {
    fn parse(spec: &str) -> Self {
        let mut parsed = Self::default();
        let chars: Vec<char> = spec.chars().collect();
        let mut i = 0;

        if let Some(align) = chars.get(1).copied().and_then(Align::from_char) {
            parsed.fill = chars[0];
            parsed.align = align;
            i = 2;
        } else if let Some(align) = chars.first().copied().and_then(Align::from_char) {
            parsed.align = align;
            i = 1;
        }

        let (width, next) = take_number(&chars, i);
        parsed.width = width;
        i = next;

        if chars.get(i) == Some(&'.') {
            let (precision, _) = take_number(&chars, i + 1);
            parsed.precision = precision;
        }
        parsed
    }

    fn apply(&self, value: &str, widths: &dyn WidthResolver) -> String {
        let mut text: String = match self.precision {
            Some(p) => value.chars().take(widths.resolve(p)).collect(),
            None => value.to_string(),
        };

        let Some(width) = self.width.map(|w| widths.resolve(w)) else {
            return text;
        };
        let len = text.chars().count();
        if len >= width {
            return text;
        }

        let pad = width - len;
        let (left, right) = match self.align {
            Align::Left => (0, pad),
            Align::Right => (pad, 0),
            Align::Center => (pad / 2, pad - pad / 2),
        };
        let fill = |n: usize| std::iter::repeat(self.fill).take(n).collect::<String>();
        text = format!("{}{}{}", fill(left), text, fill(right));
        text
    }
}

fn take_number(chars: &[char], start: usize) -> (Option<usize>, usize) {
    let mut end = start;
    while chars.get(end).is_some_and(char::is_ascii_digit) {
        end += 1;
    }
    if end == start {
        return (None, start);
    }
    let digits: String = chars[start..end].iter().collect();
    (digits.parse().ok(), end)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { name: String, spec: FormatSpec },
}

/// A parsed display template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
    names: Vec<String>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let mut last = 0;

        for caps in placeholder_pattern().captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let spec = caps
                .get(2)
                .map(|m| FormatSpec::parse(m.as_str()))
                .unwrap_or_default();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name.clone());
            }
            segments.push(Segment::Field { name, spec });
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }

        Self {
            source: source.to_string(),
            segments,
            names,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct field names in order of first use
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Substitute `values`; unknown fields render as empty.
    pub fn render(&self, values: &BTreeMap<String, String>, widths: &dyn WidthResolver) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { name, spec } => {
                    let value = values.get(name).map(String::as_str).unwrap_or("");
                    out.push_str(&spec.apply(value, widths));
                }
            }
        }
        out
    }
}
