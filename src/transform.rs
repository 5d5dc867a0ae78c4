//! Mountlist line transformer
//!
//! Rewrites handler declarations to point at a chosen build and passes every
//! other line through untouched. Lines are handled as raw bytes with their
//! terminator attached, so comments in a legacy code page survive a rewrite.

use crate::variant::{Service, Variant, HANDLER_DIR, HANDLER_KEY};
use std::borrow::Cow;
use std::io::{self, BufRead};

/// Indentation written in front of a rewritten handler declaration
const DECLARATION_INDENT: &str = "    ";

#[derive(Debug, Clone)]
struct Rule {
    service: Service,
    pattern: Vec<u8>,
    replacement: Vec<u8>,
}

/// Selector patterns paired with the line that replaces them
///
/// Built fresh for each transformation. Rules are checked in order and the
/// first match wins.
#[derive(Debug, Clone)]
pub struct ReplacementTable {
    rules: Vec<Rule>,
}

impl ReplacementTable {
    pub fn for_variant(variant: Variant) -> Self {
        let rules = Service::ALL
            .iter()
            .map(|&service| Rule {
                service,
                pattern: service.selector_pattern().into_bytes(),
                replacement: format!(
                    "{}{}{}{}\n",
                    DECLARATION_INDENT,
                    HANDLER_KEY,
                    HANDLER_DIR,
                    service.handler_filename(variant)
                )
                .into_bytes(),
            })
            .collect();

        Self { rules }
    }

    /// Service whose selector appears in `line`, if any
    pub fn selector_service(&self, line: &[u8]) -> Option<Service> {
        self.rules
            .iter()
            .find(|rule| contains(line, &rule.pattern))
            .map(|rule| rule.service)
    }

    /// Replacement for `line` when it is a selector line
    pub fn replacement_for(&self, line: &[u8]) -> Option<&[u8]> {
        self.rules
            .iter()
            .find(|rule| contains(line, &rule.pattern))
            .map(|rule| rule.replacement.as_slice())
    }

    /// Rewrite a single line. Pass-through lines are borrowed, not copied.
    pub fn rewrite<'a>(&'a self, line: &'a [u8]) -> Cow<'a, [u8]> {
        match self.replacement_for(line) {
            Some(replacement) => Cow::Borrowed(replacement),
            None => Cow::Borrowed(line),
        }
    }
}

/// Byte substring search
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Lazily transform a sequence of lines for `variant`
///
/// Yields exactly one output line per input line.
pub fn transform<I>(lines: I, variant: Variant) -> impl Iterator<Item = Vec<u8>>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let table = ReplacementTable::for_variant(variant);
    lines
        .into_iter()
        .map(move |line| table.rewrite(line.as_ref()).into_owned())
}

/// Transform a whole in-memory document
pub fn transform_text(text: &str, variant: Variant) -> String {
    let table = ReplacementTable::for_variant(variant);
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        match table.replacement_for(line.as_bytes()) {
            // Replacements are built from ASCII constants
            Some(replacement) => out.push_str(&String::from_utf8_lossy(replacement)),
            None => out.push_str(line),
        }
    }
    out
}

/// Iterator over the raw lines of a reader, terminators included
///
/// A final line without a trailing newline is yielded as-is.
pub struct RawLines<R> {
    reader: R,
}

impl<R: BufRead> RawLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Iterator for RawLines<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => None,
            Ok(_) => Some(Ok(line)),
            Err(e) => Some(Err(e)),
        }
    }
}
