//! Formatting-preserving text patcher
//!
//! Edits are applied to the original document text rather than by
//! re-serialising the tree. Each entity is located by its `publicID`
//! attribute, its element block is scanned once to find the direct child
//! fields, and only the affected spans are rewritten. Bytes outside those
//! spans are copied through unchanged.

use crate::changes::{ChangeTracker, EntityChanges};
use crate::{Error, Result};
use quick_xml::escape::{escape, unescape};
use scinv_schema::EntityKind;
use tracing::{debug, trace};

/// Indentation step used when a block has no child line to copy it from
pub const DEFAULT_INDENT: &str = "  ";

const ID_ATTRIBUTE: &str = "publicID";

type Scan<T> = std::result::Result<T, String>;

/// An opening tag and its byte span
#[derive(Debug)]
struct Tag {
    name: String,
    start: usize,
    /// One past the closing `>`
    end: usize,
    self_closing: bool,
}

/// A direct child element of a block
#[derive(Debug)]
struct Child {
    name: String,
    start: usize,
    open_end: usize,
    close_start: Option<usize>,
    end: usize,
}

#[derive(Debug)]
struct Block {
    open: Tag,
    close_start: Option<usize>,
    children: Vec<Child>,
}

/// A replacement of `start..end`; insertions have `start == end`
#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// One attribute inside an opening tag, offsets relative to the tag
#[derive(Debug)]
struct AttrSpan {
    name: String,
    /// Start of the whitespace before the name
    lead: usize,
    value_start: usize,
    value_end: usize,
    /// One past the closing quote
    end: usize,
}

/// Splices pending edits into raw document text
#[derive(Debug, Clone)]
pub struct TextPatcher {
    indent_unit: String,
}

impl Default for TextPatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TextPatcher {
    pub fn new() -> Self {
        Self {
            indent_unit: DEFAULT_INDENT.to_string(),
        }
    }

    #[must_use]
    pub fn with_indent_unit(mut self, unit: impl Into<String>) -> Self {
        self.indent_unit = unit.into();
        self
    }

    /// Apply every pending entity edit to `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Patch`] if an entity cannot be located or its block
    /// is malformed. No partial result is returned.
    pub fn patch(&self, raw: &str, changes: &ChangeTracker) -> Result<String> {
        let mut text = raw.to_string();
        for (entity_id, entity) in changes.iter() {
            if entity.is_empty() {
                continue;
            }
            text = self.patch_entity(&text, entity_id, entity)?;
        }
        Ok(text)
    }

    /// Apply the edits of a single entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Patch`] if the entity cannot be located or its block
    /// is malformed.
    pub fn patch_entity(
        &self,
        text: &str,
        entity_id: &str,
        changes: &EntityChanges,
    ) -> Result<String> {
        let start = find_entity(text, entity_id)
            .ok_or_else(|| Error::patch(entity_id, "identifier not found in source text"))?;
        let open = read_tag(text, start).map_err(|m| Error::patch(entity_id, m))?;
        let block = scan_block(text, open).map_err(|m| Error::patch(entity_id, m))?;

        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let block_indent = indent_before(text, block.open.start).unwrap_or("");
        let child_indent = block
            .children
            .iter()
            .find_map(|c| indent_before(text, c.start))
            .map_or_else(|| format!("{block_indent}{}", self.indent_unit), str::to_string);
        let prefix = block.open.name.split_once(':').map(|(p, _)| p);

        let mut edits = Vec::new();
        let mut inserts = Vec::new();

        for (field, value) in &changes.fields {
            let qname = qualify(prefix, field);
            let existing = block.children.iter().find(|c| c.name == qname);
            match existing {
                Some(child) if value.is_empty() => edits.push(removal(text, child)),
                Some(child) => match child.close_start {
                    Some(close) => edits.push(Edit {
                        start: child.open_end,
                        end: close,
                        text: escape(value.as_str()).into_owned(),
                    }),
                    None => edits.push(Edit {
                        start: child.start,
                        end: child.end,
                        text: element(&qname, value),
                    }),
                },
                None if value.is_empty() => {}
                None => inserts.push(element(&qname, value)),
            }
        }

        let mut open_tag = text[block.open.start..block.open.end].to_string();
        if !changes.attributes.is_empty() {
            open_tag = rewrite_attributes(&open_tag, block.open.name.len(), &changes.attributes)
                .map_err(|m| Error::patch(entity_id, m))?;
        }

        if !inserts.is_empty() {
            if block.open.self_closing {
                open_tag = expand_self_closing(
                    &open_tag,
                    &block.open.name,
                    &inserts,
                    newline,
                    &child_indent,
                    block_indent,
                );
            } else {
                edits.push(insertion(
                    text,
                    &block,
                    &inserts,
                    newline,
                    &child_indent,
                    block_indent,
                ));
            }
        }

        if open_tag != text[block.open.start..block.open.end] {
            edits.push(Edit {
                start: block.open.start,
                end: block.open.end,
                text: open_tag,
            });
        }

        debug!(
            "Patching {} <{}>: {} edits",
            entity_id,
            block.open.name,
            edits.len()
        );
        Ok(apply(text, edits))
    }
}

fn apply(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.start.cmp(&a.start));
    let mut out = text.to_string();
    for edit in edits {
        trace!("Splice {}..{} -> {:?}", edit.start, edit.end, edit.text);
        out.replace_range(edit.start..edit.end, &edit.text);
    }
    out
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn local_part(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

fn element(qname: &str, value: &str) -> String {
    format!("<{qname}>{}</{qname}>", escape(value))
}

/// Byte offset of the `<` opening the element whose `publicID` is `entity_id`.
/// Values are compared unescaped, so any legal spacing and quoting of the
/// attribute matches.
fn find_entity(text: &str, entity_id: &str) -> Option<usize> {
    let mut checked = None;
    for (pos, _) in text.match_indices(ID_ATTRIBUTE) {
        let Some(lt) = text[..pos].rfind('<') else {
            continue;
        };
        if checked == Some(lt) || text[lt + 1..].starts_with(['!', '?', '/']) {
            continue;
        }
        checked = Some(lt);

        let Ok(tag) = read_tag(text, lt) else {
            continue;
        };
        if tag.end <= pos {
            continue;
        }
        let source = &text[tag.start..tag.end];
        let Ok((spans, _)) = attribute_spans(source, tag.name.len()) else {
            continue;
        };
        let matched = spans.iter().any(|span| {
            span.name == ID_ATTRIBUTE
                && unescape(&source[span.value_start..span.value_end])
                    .is_ok_and(|value| value == entity_id)
        });
        if matched {
            return Some(lt);
        }
    }
    None
}

fn tag_name(s: &str) -> &str {
    let end = s
        .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .unwrap_or(s.len());
    &s[..end]
}

/// Index one past `terminator`, searching from `from`
fn skip_past(text: &str, from: usize, terminator: &str) -> Scan<usize> {
    text[from..]
        .find(terminator)
        .map(|i| from + i + terminator.len())
        .ok_or_else(|| format!("unterminated markup at byte {from}"))
}

/// Read the opening tag starting at `lt`, honouring quoted attribute values
fn read_tag(text: &str, lt: usize) -> Scan<Tag> {
    let name = tag_name(&text[lt + 1..]);
    if name.is_empty() {
        return Err(format!("expected an element name at byte {lt}"));
    }
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = lt + 1 + name.len();
    while i < bytes.len() {
        match (quote, bytes[i]) {
            (Some(q), b) if b == q => quote = None,
            (None, b'"' | b'\'') => quote = Some(bytes[i]),
            (None, b'>') => {
                return Ok(Tag {
                    name: name.to_string(),
                    start: lt,
                    end: i + 1,
                    self_closing: bytes[i - 1] == b'/',
                });
            }
            _ => {}
        }
        i += 1;
    }
    Err(format!("unterminated <{name}> tag"))
}

/// Find the block's closing tag and its direct children
fn scan_block(text: &str, open: Tag) -> Scan<Block> {
    if open.self_closing {
        return Ok(Block {
            open,
            close_start: None,
            children: Vec::new(),
        });
    }

    let mut children = Vec::new();
    // name, start, end of opening tag
    let mut stack: Vec<(String, usize, usize)> = Vec::new();
    let mut pos = open.end;

    loop {
        let lt = text[pos..]
            .find('<')
            .map(|i| pos + i)
            .ok_or_else(|| format!("<{}> is not closed", open.name))?;
        let rest = &text[lt..];

        if rest.starts_with("<!--") {
            pos = skip_past(text, lt, "-->")?;
        } else if rest.starts_with("<![CDATA[") {
            pos = skip_past(text, lt, "]]>")?;
        } else if rest.starts_with("<?") {
            pos = skip_past(text, lt, "?>")?;
        } else if rest.starts_with("<!") {
            pos = skip_past(text, lt, ">")?;
        } else if rest.starts_with("</") {
            let name = tag_name(&text[lt + 2..]);
            let gt = skip_past(text, lt, ">")?;
            match stack.pop() {
                None if name == open.name => {
                    return Ok(Block {
                        open,
                        close_start: Some(lt),
                        children,
                    });
                }
                None => {
                    return Err(format!("expected </{}>, found </{name}>", open.name));
                }
                Some((child, start, open_end)) => {
                    if stack.is_empty() {
                        children.push(Child {
                            name: child,
                            start,
                            open_end,
                            close_start: Some(lt),
                            end: gt,
                        });
                    }
                }
            }
            pos = gt;
        } else {
            let tag = read_tag(text, lt)?;
            pos = tag.end;
            if !tag.self_closing {
                stack.push((tag.name, lt, tag.end));
            } else if stack.is_empty() {
                children.push(Child {
                    name: tag.name,
                    start: lt,
                    open_end: tag.end,
                    close_start: None,
                    end: tag.end,
                });
            }
        }
    }
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

/// The whitespace before `pos` if it is the first thing on its line
fn indent_before(text: &str, pos: usize) -> Option<&str> {
    let lead = &text[line_start(text, pos)..pos];
    lead.bytes()
        .all(|b| b == b' ' || b == b'\t')
        .then_some(lead)
}

/// Remove a child, taking its whole line when it stands alone on it
fn removal(text: &str, child: &Child) -> Edit {
    let line_end = text[child.end..].find('\n').map(|i| child.end + i + 1);
    match line_end {
        Some(line_end)
            if indent_before(text, child.start).is_some()
                && text[child.end..line_end].trim().is_empty() =>
        {
            Edit {
                start: line_start(text, child.start),
                end: line_end,
                text: String::new(),
            }
        }
        _ => Edit {
            start: child.start,
            end: child.end,
            text: String::new(),
        },
    }
}

/// Insert new fields before the first structural child, or before the
/// closing tag
fn insertion(
    text: &str,
    block: &Block,
    elements: &[String],
    newline: &str,
    child_indent: &str,
    block_indent: &str,
) -> Edit {
    let markers = EntityKind::from_tag(local_part(&block.open.name))
        .map_or(&[][..], EntityKind::insertion_markers);
    let anchor = block
        .children
        .iter()
        .find(|c| markers.contains(&local_part(&c.name)))
        .map(|c| c.start)
        .or(block.close_start)
        .unwrap_or(block.open.end);

    let lines = |out: &mut String| {
        for element in elements {
            out.push_str(child_indent);
            out.push_str(element);
            out.push_str(newline);
        }
    };

    if indent_before(text, anchor).is_some() {
        let mut out = String::new();
        lines(&mut out);
        let at = line_start(text, anchor);
        return Edit {
            start: at,
            end: at,
            text: out,
        };
    }

    // Anchor shares its line with other markup: open a new line for each
    // field and restore the anchor's position afterwards.
    let mut out = String::new();
    for element in elements {
        out.push_str(newline);
        out.push_str(child_indent);
        out.push_str(element);
    }
    out.push_str(newline);
    if Some(anchor) == block.close_start {
        out.push_str(block_indent);
    } else {
        out.push_str(child_indent);
    }
    Edit {
        start: anchor,
        end: anchor,
        text: out,
    }
}

/// Turn `<x .../>` into `<x ...>` + fields + `</x>`
fn expand_self_closing(
    open_tag: &str,
    name: &str,
    elements: &[String],
    newline: &str,
    child_indent: &str,
    block_indent: &str,
) -> String {
    let head = open_tag
        .strip_suffix("/>")
        .unwrap_or(open_tag)
        .trim_end();
    let mut out = format!("{head}>");
    for element in elements {
        out.push_str(newline);
        out.push_str(child_indent);
        out.push_str(element);
    }
    out.push_str(newline);
    out.push_str(block_indent);
    out.push_str(&format!("</{name}>"));
    out
}

fn attribute_spans(tag: &str, name_len: usize) -> Scan<(Vec<AttrSpan>, usize)> {
    let bytes = tag.as_bytes();
    let mut spans = Vec::new();
    let mut i = 1 + name_len;
    let mut tail = i;

    loop {
        let lead = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'/' || bytes[i] == b'>' {
            return Ok((spans, tail));
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'/' | b'>')
        {
            i += 1;
        }
        let name = tag[name_start..i].to_string();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            return Err(format!("attribute '{name}' has no value"));
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let quote = match bytes.get(i) {
            Some(q @ (b'"' | b'\'')) => *q,
            _ => return Err(format!("attribute '{name}' is not quoted")),
        };
        let value_start = i + 1;
        let value_end = tag[value_start..]
            .find(char::from(quote))
            .map(|off| value_start + off)
            .ok_or_else(|| format!("attribute '{name}' is not terminated"))?;
        i = value_end + 1;
        tail = i;

        spans.push(AttrSpan {
            name,
            lead,
            value_start,
            value_end,
            end: i,
        });
    }
}

/// Replace, remove or append attributes inside an opening tag
fn rewrite_attributes(
    tag: &str,
    name_len: usize,
    changes: &[(String, Option<String>)],
) -> Scan<String> {
    let (spans, tail) = attribute_spans(tag, name_len)?;
    let mut edits = Vec::new();
    let mut appended = String::new();

    for (name, value) in changes {
        let existing = spans.iter().find(|s| s.name == *name);
        match (existing, value) {
            (Some(span), Some(value)) => edits.push(Edit {
                start: span.value_start,
                end: span.value_end,
                text: escape(value.as_str()).into_owned(),
            }),
            (Some(span), None) => edits.push(Edit {
                start: span.lead,
                end: span.end,
                text: String::new(),
            }),
            (None, Some(value)) => {
                appended.push_str(&format!(" {name}=\"{}\"", escape(value.as_str())));
            }
            (None, None) => {}
        }
    }

    if !appended.is_empty() {
        edits.push(Edit {
            start: tail,
            end: tail,
            text: appended,
        });
    }
    Ok(apply(tag, edits))
}
