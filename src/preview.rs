//! Dry-run preview of a variant change

use crate::transform::{RawLines, ReplacementTable};
use crate::variant::Variant;
use colored::*;
use similar::TextDiff;
use std::io::IsTerminal;

/// One handler declaration that would be rewritten
#[derive(Debug, Clone, PartialEq)]
pub struct LineChange {
    pub line_number: usize,
    pub old_content: String,
    pub new_content: String,
}

#[derive(Debug, Clone)]
pub struct Preview {
    pub variant: Variant,
    pub total_lines: usize,
    /// Selector lines whose text would change
    ///
    /// A declaration that only gains its missing final newline is not listed.
    pub changes: Vec<LineChange>,
    original: String,
    updated: String,
}

impl Preview {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

fn display_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Work out what applying `variant` to `content` would change
pub fn plan(content: &[u8], variant: Variant) -> Preview {
    let table = ReplacementTable::for_variant(variant);
    let mut changes = Vec::new();
    let mut updated = Vec::with_capacity(content.len());
    let mut total_lines = 0;

    for (idx, line) in RawLines::new(content).enumerate() {
        // reading from a byte slice cannot fail
        let Ok(line) = line else { break };
        total_lines += 1;
        let out = table.rewrite(&line);
        let old_content = display_line(&line);
        let new_content = display_line(&out);
        if old_content != new_content {
            changes.push(LineChange {
                line_number: idx + 1,
                old_content,
                new_content,
            });
        }
        updated.extend_from_slice(&out);
    }

    Preview {
        variant,
        total_lines,
        changes,
        original: String::from_utf8_lossy(content).into_owned(),
        updated: String::from_utf8_lossy(&updated).into_owned(),
    }
}

pub struct PreviewFormatter;

impl PreviewFormatter {
    /// Colour only when stdout is a terminal and NO_COLOR is unset
    pub fn should_use_color() -> bool {
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        std::io::stdout().is_terminal()
    }

    /// Changed lines as `L<n>: - old` / `L<n>: + new` pairs with a summary
    pub fn format_preview(file: &str, preview: &Preview, use_color: bool) -> String {
        let mut output = String::new();

        if use_color {
            output.push_str(&format!(
                "{} {} ({})\n",
                "Dry run:".bold().cyan(),
                preview.variant.to_string().white().bold(),
                preview.variant.cpu_label()
            ));
            output.push_str(&format!("{}\n", file.bold().cyan()));
        } else {
            output.push_str(&format!(
                "Dry run: {} ({})\n",
                preview.variant,
                preview.variant.cpu_label()
            ));
            output.push_str(&format!("{}\n", file));
        }

        if preview.is_noop() {
            output.push_str("No changes would be made.\n");
            return output;
        }

        for change in &preview.changes {
            if use_color {
                output.push_str(&format!(
                    "L{}: {} {}\nL{}: {} {}\n",
                    change.line_number,
                    "-".red().bold(),
                    change.old_content.red(),
                    change.line_number,
                    "+".green().bold(),
                    change.new_content.green()
                ));
            } else {
                output.push_str(&format!(
                    "L{}: - {}\nL{}: + {}\n",
                    change.line_number, change.old_content, change.line_number, change.new_content
                ));
            }
        }

        let count = preview.changes.len();
        output.push_str(&format!(
            "\nTotal: {} change{} in {} lines\n",
            count,
            if count == 1 { "" } else { "s" },
            preview.total_lines
        ));
        output
    }

    /// Unified diff of the whole mountlist
    pub fn format_unified(file: &str, preview: &Preview, context: usize) -> String {
        TextDiff::from_lines(preview.original.as_str(), preview.updated.as_str())
            .unified_diff()
            .context_radius(context)
            .header(file, &format!("{} ({})", file, preview.variant))
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTLIST: &str = "DBOX:\n    Handler = Devs:Cloud/dropbox-handler.68k\n    Stacksize = 16384\n#\n";

    #[test]
    fn test_plan_reports_changed_lines() {
        let preview = plan(MOUNTLIST.as_bytes(), Variant::V102e);
        assert_eq!(preview.total_lines, 4);
        assert_eq!(
            preview.changes,
            vec![LineChange {
                line_number: 2,
                old_content: "    Handler = Devs:Cloud/dropbox-handler.68k".to_string(),
                new_content: "    Handler = Devs:Cloud/dropbox-handler_102e.68k".to_string(),
            }]
        );
    }

    #[test]
    fn test_plan_noop_when_already_selected() {
        let preview = plan(MOUNTLIST.as_bytes(), Variant::M68k);
        assert!(preview.is_noop());
    }

    #[test]
    fn test_plan_ignores_missing_final_newline() {
        let content = b"DBOX:\n    Handler = Devs:Cloud/dropbox-handler.68k";
        let preview = plan(content, Variant::M68k);
        assert!(preview.is_noop());
        assert_eq!(preview.total_lines, 2);
    }

    #[test]
    fn test_plan_crlf_declaration_already_selected() {
        let content = b"DBOX:\r\n    Handler = Devs:Cloud/dropbox-handler_102e.68k\r\n";
        assert!(plan(content, Variant::V102e).is_noop());
        assert_eq!(plan(content, Variant::M68k).changes.len(), 1);
    }

    #[test]
    fn test_format_preview_plain() {
        let preview = plan(MOUNTLIST.as_bytes(), Variant::V102e);
        let out = PreviewFormatter::format_preview("cloud.mountlist", &preview, false);
        assert!(out.starts_with("Dry run: 102e (68060/80)\n"));
        assert!(out.contains("L2: - "));
        assert!(out.contains("L2: +     Handler = Devs:Cloud/dropbox-handler_102e.68k"));
        assert!(out.contains("Total: 1 change in 4 lines"));
    }

    #[test]
    fn test_format_preview_noop() {
        let preview = plan(MOUNTLIST.as_bytes(), Variant::M68k);
        let out = PreviewFormatter::format_preview("cloud.mountlist", &preview, false);
        assert!(out.contains("No changes would be made."));
    }

    #[test]
    fn test_format_unified() {
        let preview = plan(MOUNTLIST.as_bytes(), Variant::V102e);
        let out = PreviewFormatter::format_unified("cloud.mountlist", &preview, 1);
        assert!(out.contains("-    Handler = Devs:Cloud/dropbox-handler.68k"));
        assert!(out.contains("+    Handler = Devs:Cloud/dropbox-handler_102e.68k"));
        assert!(out.contains("--- cloud.mountlist"));
    }
}
