// Ratel Preprocessor
// Normalizes contract declaration keywords to `class` before generic parsing

use crate::ast::ClassKind;
use indexmap::IndexMap;

/// Declared class-like names and the keyword each was written with
pub type ClassTypes = IndexMap<String, ClassKind>;

/// Anchor points mapping offsets in normalized text back to the original
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetMap {
    anchors: Vec<(usize, usize)>,
}

impl OffsetMap {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn to_original(&self, normalized: usize) -> usize {
        let index = self.anchors.partition_point(|(n, _)| *n <= normalized);
        match index.checked_sub(1).map(|i| self.anchors[i]) {
            Some((n, o)) => o + (normalized - n),
            None => normalized,
        }
    }

    fn push(&mut self, normalized: usize, original: usize) {
        self.anchors.push((normalized, original));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub class_types: ClassTypes,
    pub normalized: String,
    pub offsets: OffsetMap,
}

#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    Code,
    Comment,
    Quoted(char),
    TripleQuoted(char),
}

/// Rewrite `struct`, `event`, `interface` and `contract` declarations at the
/// start of a logical line to `class`, recording each declared name.
///
/// Text inside strings and comments is left alone. Running this on already
/// normalized text returns the same text.
pub fn pre_parse(source: &str) -> Preprocessed {
    let mut normalized = String::with_capacity(source.len());
    let mut class_types = ClassTypes::new();
    let mut offsets = OffsetMap::identity();
    let mut state = ScanState::Code;
    let mut depth = 0usize;
    let mut at_line_start = true;
    let mut i = 0;

    while i < source.len() {
        let rest = &source[i..];
        if state == ScanState::Code && at_line_start && depth == 0 {
            let indent = rest.len() - rest.trim_start_matches([' ', '\t']).len();
            if let Some((kind, keyword_len, name)) = declaration(&rest[indent..]) {
                normalized.push_str(&rest[..indent]);
                normalized.push_str("class");
                i += indent + keyword_len;
                if keyword_len != "class".len() {
                    offsets.push(normalized.len(), i);
                }
                if !name.is_empty() {
                    class_types.insert(name.to_string(), kind);
                }
                at_line_start = false;
                continue;
            }
        }

        let Some(c) = rest.chars().next() else {
            break;
        };
        let width = c.len_utf8();
        match state {
            ScanState::Code => match c {
                '#' => state = ScanState::Comment,
                '"' | '\'' => {
                    let triple = format!("{c}{c}{c}");
                    if rest.starts_with(&triple) {
                        normalized.push_str(&triple);
                        i += 3;
                        state = ScanState::TripleQuoted(c);
                        at_line_start = false;
                        continue;
                    }
                    state = ScanState::Quoted(c);
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            },
            ScanState::Comment => {
                if c == '\n' {
                    state = ScanState::Code;
                }
            }
            ScanState::Quoted(quote) => {
                if c == '\\' {
                    let escaped = rest[1..].chars().next().map_or(0, char::len_utf8);
                    normalized.push_str(&rest[..1 + escaped]);
                    i += 1 + escaped;
                    continue;
                }
                if c == quote || c == '\n' {
                    state = ScanState::Code;
                }
            }
            ScanState::TripleQuoted(quote) => {
                let triple = format!("{quote}{quote}{quote}");
                if rest.starts_with(&triple) {
                    normalized.push_str(&triple);
                    i += 3;
                    state = ScanState::Code;
                    continue;
                }
            }
        }

        normalized.push(c);
        i += width;
        at_line_start = c == '\n' && matches!(state, ScanState::Code);
    }

    Preprocessed {
        class_types,
        normalized,
        offsets,
    }
}

/// Match `<keyword> <Name>` at the start of a line
fn declaration(line: &str) -> Option<(ClassKind, usize, &str)> {
    let word_end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(line.len());
    let kind = ClassKind::from_keyword(&line[..word_end])?;
    let after = &line[word_end..];
    let name_part = after.trim_start_matches([' ', '\t']);
    if name_part.len() == after.len() {
        return None;
    }
    let name_end = name_part
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(name_part.len());
    let name = &name_part[..name_end];
    if name.is_empty() || !name_part[name_end..].trim_start().starts_with([':', '(']) {
        return None;
    }
    Some((kind, word_end, name))
}
