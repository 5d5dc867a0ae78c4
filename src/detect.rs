//! Read-only detection of the handler build a mountlist selects

use crate::transform::{contains, RawLines};
use crate::variant::{Service, Variant};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Variant selected by the mountlist at `path`
///
/// Never fails: a missing or unreadable mountlist reads as 68k, which is what
/// a fresh handler install ships with.
pub fn detect_variant(path: &Path) -> Variant {
    match File::open(path) {
        Ok(file) => detect_variant_in(BufReader::new(file)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Mountlist unreadable, assuming 68k");
            Variant::default()
        }
    }
}

/// Variant selected by a mountlist read from `reader`
///
/// The first 102e handler declaration for either service decides. A read
/// error stops the scan with what has been seen so far.
pub fn detect_variant_in<R: BufRead>(reader: R) -> Variant {
    let patterns: Vec<Vec<u8>> = Service::ALL
        .iter()
        .map(|service| service.variant_pattern(Variant::V102e).into_bytes())
        .collect();

    for line in RawLines::new(reader) {
        let Ok(line) = line else { break };
        if patterns.iter().any(|p| contains(&line, p)) {
            return Variant::V102e;
        }
    }

    Variant::M68k
}
