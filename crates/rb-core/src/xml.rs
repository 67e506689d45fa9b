//! Minimal XML reader → element tree.
//!
//! Built on `winnow` 0.7. Understands elements, attributes, character data,
//! CDATA sections, comments, processing instructions and a DOCTYPE
//! prologue, which is everything scene documents and vector artwork use.
//! Any well-formedness violation (mismatched or unclosed tags, stray
//! content after the root) is reported as an error; callers decide how to
//! degrade.

use winnow::combinator::{alt, delimited};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{take_till, take_until, take_while};

/// Nesting limit; deeper documents are rejected instead of recursing further.
const MAX_DEPTH: usize = 256;

/// One XML element with its attributes (in document order), child elements,
/// and concatenated character data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    /// Attribute value by exact name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Pre-order iterator over every descendant (excluding `self`).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// First descendant with the given tag name, in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.descendants().find(|e| e.name == name)
    }

    /// `self` and every descendant with the given tag name, in document order.
    pub fn elements_by_tag<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        std::iter::once(self)
            .chain(self.descendants())
            .filter(move |e| e.name == name)
    }

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set (or replace in place) an attribute.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|(k, _)| k == name)?;
        Some(self.attrs.remove(pos).1)
    }

    /// Serialize as markup. Character data is written before children.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    pub fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape(v));
            out.push('"');
        }
        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape(&self.text));
        for child in &self.children {
            child.write_markup(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// Parse an XML document and return its root element.
pub fn parse_xml(input: &str) -> Result<Element, String> {
    let mut rest = input.strip_prefix('\u{feff}').unwrap_or(input);

    skip_misc(&mut rest).map_err(|e| format!("prologue parse error: {e}"))?;
    if rest.is_empty() {
        return Err("document has no root element".into());
    }

    let root = parse_element(&mut rest, 0).map_err(|e| format!("element parse error: {e}"))?;

    skip_misc(&mut rest).map_err(|e| format!("epilogue parse error: {e}"))?;
    if !rest.is_empty() {
        return Err(format!(
            "unexpected content after root element: {:?}",
            rest.chars().take(16).collect::<String>()
        ));
    }
    Ok(root)
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn cut() -> ErrMode<ContextError> {
    ErrMode::Cut(ContextError::new())
}

/// Skip whitespace, comments, processing instructions and DOCTYPE.
fn skip_misc(input: &mut &str) -> ModalResult<()> {
    loop {
        *input = input.trim_start();
        if input.starts_with("<!--") {
            skip_comment(input)?;
        } else if input.starts_with("<?") {
            skip_processing_instruction(input)?;
        } else if input.starts_with("<!DOCTYPE") || input.starts_with("<!doctype") {
            skip_doctype(input)?;
        } else {
            return Ok(());
        }
    }
}

fn skip_comment(input: &mut &str) -> ModalResult<()> {
    delimited("<!--", take_until(0.., "-->"), "-->")
        .void()
        .parse_next(input)
}

fn skip_processing_instruction(input: &mut &str) -> ModalResult<()> {
    delimited("<?", take_until(0.., "?>"), "?>")
        .void()
        .parse_next(input)
}

fn skip_doctype(input: &mut &str) -> ModalResult<()> {
    doctype_head(input)?;
    if input.starts_with('[') {
        internal_subset(input)?;
    }
    (take_till(0.., '>'), '>').void().parse_next(input)
}

fn doctype_head<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_till(0.., |c: char| c == '[' || c == '>').parse_next(input)
}

fn internal_subset<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    delimited('[', take_until(0.., "]"), ']').parse_next(input)
}

fn expect_char(mut c: char, input: &mut &str) -> ModalResult<char> {
    c.parse_next(input)
}

fn char_data<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_till(1.., '<').parse_next(input)
}

fn cdata<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    delimited("<![CDATA[", take_until(0.., "]]>"), "]]>").parse_next(input)
}

fn skip_space(input: &mut &str) {
    *input = input.trim_start();
}

fn parse_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
    })
    .parse_next(input)
}

fn parse_quoted<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .parse_next(input)
}

fn parse_attribute(input: &mut &str) -> ModalResult<(String, String)> {
    let name = parse_name(input)?;
    skip_space(input);
    expect_char('=', input)?;
    skip_space(input);
    let raw = parse_quoted(input)?;
    Ok((name.to_string(), decode_entities(raw)))
}

fn parse_element(input: &mut &str, depth: usize) -> ModalResult<Element> {
    if depth > MAX_DEPTH {
        return Err(cut());
    }

    expect_char('<', input)?;
    let name = parse_name(input)?.to_string();
    let mut element = Element {
        name,
        ..Default::default()
    };

    loop {
        skip_space(input);
        if input.starts_with("/>") {
            *input = &input[2..];
            return Ok(element);
        }
        if input.starts_with('>') {
            *input = &input[1..];
            break;
        }
        if input.is_empty() {
            return Err(cut());
        }
        let attr = parse_attribute(input).map_err(|_| cut())?;
        element.attrs.push(attr);
    }

    loop {
        if input.starts_with("</") {
            *input = &input[2..];
            let close = parse_name(input)?;
            if close != element.name {
                return Err(cut());
            }
            skip_space(input);
            expect_char('>', input)?;
            return Ok(element);
        } else if input.starts_with("<!--") {
            skip_comment(input).map_err(|_| cut())?;
        } else if input.starts_with("<![CDATA[") {
            let data = cdata(input).map_err(|_| cut())?;
            element.text.push_str(data);
        } else if input.starts_with("<?") {
            skip_processing_instruction(input).map_err(|_| cut())?;
        } else if input.starts_with('<') {
            let child = parse_element(input, depth + 1)?;
            element.children.push(child);
        } else if input.is_empty() {
            return Err(cut());
        } else {
            let chunk = char_data(input)?;
            element.text.push_str(&decode_entities(chunk));
        }
    }
}

/// Decode the predefined entities and numeric character references.
/// Unknown entities are kept verbatim.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape text for use inside an attribute value or character data.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = r##"<?xml version="1.0" encoding="utf-8"?>
<!-- designer export -->
<Root Version='2'>
  <DesignerItem ID="a" Left="1.5">
    <Content><Rectangle Fill="#FF112233"/></Content>
  </DesignerItem>
</Root>"##;
        let root = parse_xml(doc).unwrap();
        assert_eq!(root.name, "Root");
        assert_eq!(root.attr("Version"), Some("2"));

        let item = root.find("DesignerItem").unwrap();
        assert_eq!(item.attr("ID"), Some("a"));
        assert_eq!(item.attr("Left"), Some("1.5"));
        let rect = item.find("Rectangle").unwrap();
        assert_eq!(rect.attr("Fill"), Some("#FF112233"));
    }

    #[test]
    fn descendants_are_in_document_order() {
        let root = parse_xml("<a><b><c/></b><d/></a>").unwrap();
        let names: Vec<&str> = root.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["b", "c", "d"]);
    }

    #[test]
    fn elements_by_tag_includes_root() {
        let root = parse_xml("<g><g/><x><g/></x></g>").unwrap();
        assert_eq!(root.elements_by_tag("g").count(), 3);
    }

    #[test]
    fn text_cdata_and_entities() {
        let root = parse_xml("<t a=\"x &amp; y\">1 &lt; 2 <![CDATA[<raw>]]> &#65;&#x42;</t>").unwrap();
        assert_eq!(root.attr("a"), Some("x & y"));
        assert_eq!(root.text, "1 < 2 <raw> AB");
    }

    #[test]
    fn unknown_entities_are_kept() {
        assert_eq!(decode_entities("a &nbsp; b & c"), "a &nbsp; b & c");
    }

    #[test]
    fn doctype_is_skipped() {
        let root = parse_xml("<!DOCTYPE svg [ <!ENTITY x \"y\"> ]><svg/>").unwrap();
        assert_eq!(root.name, "svg");
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(parse_xml("").is_err());
        assert!(parse_xml("   ").is_err());
        assert!(parse_xml("<a><b></a>").is_err());
        assert!(parse_xml("<a>").is_err());
        assert!(parse_xml("<a x=1/>").is_err());
        assert!(parse_xml("<a/><b/>").is_err());
        assert!(parse_xml("not xml at all").is_err());
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let doc = format!("{}{}", "<a>".repeat(MAX_DEPTH + 2), "</a>".repeat(MAX_DEPTH + 2));
        assert!(parse_xml(&doc).is_err());
    }

    #[test]
    fn markup_reparses_to_same_tree() {
        let mut root = parse_xml(r#"<svg viewBox="0 0 4 4"><g><rect x="1"/></g><text>a &lt; b</text></svg>"#).unwrap();
        root.set_attr("width", "40");
        root.set_attr("viewBox", "0 0 8 8");
        assert_eq!(root.remove_attr("missing"), None);

        let markup = root.to_markup();
        assert!(markup.starts_with(r#"<svg viewBox="0 0 8 8" width="40">"#));
        assert_eq!(parse_xml(&markup).unwrap(), root);
    }

    #[test]
    fn escape_roundtrips_through_decode() {
        let text = r#"<"a" & b>"#;
        assert_eq!(decode_entities(&escape(text)), text);
    }
}
