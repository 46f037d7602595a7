// Text cleanup applied to every redacted note before it enters a prompt.
// Strips invisible Unicode, normalizes line endings and blank-line runs.

/// Clean a note: invisible/format characters and control characters removed,
/// CRLF/CR converted to LF, trailing whitespace trimmed per line, runs of
/// blank lines collapsed to one, leading/trailing blank lines dropped.
pub fn clean_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let visible = remove_invisible_chars(&unified);
    normalize_whitespace(&visible)
}

/// Remove invisible Unicode characters that could manipulate LLM behavior.
/// Preserves standard whitespace (space, newline, tab).
fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c == ' ' || c == '\n' || c == '\t' {
                return Some(c);
            }
            // Non-breaking spaces are common in EHR exports
            if matches!(c, '\u{00A0}' | '\u{202F}') {
                return Some(' ');
            }
            if matches!(
                c,
                '\u{00AD}'  // Soft hyphen
                | '\u{200B}' // Zero-width space
                | '\u{200C}' // Zero-width non-joiner
                | '\u{200D}' // Zero-width joiner
                | '\u{200E}' // Left-to-right mark
                | '\u{200F}' // Right-to-left mark
                | '\u{202A}'..='\u{202E}' // Directional embeddings and overrides
                | '\u{2060}'..='\u{2064}' // Word joiner, invisible operators
                | '\u{2066}'..='\u{2069}' // Directional isolates
                | '\u{FEFF}' // BOM / zero-width no-break space
            ) {
                return None;
            }
            if c.is_control() {
                return None;
            }
            Some(c)
        })
        .collect()
}

/// Collapse multiple blank lines and trim trailing whitespace per line.
fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut prev_blank = false;

    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim_start().is_empty() {
            if !prev_blank {
                lines.push("");
                prev_blank = true;
            }
        } else {
            lines.push(trimmed);
            prev_blank = false;
        }
    }

    while lines.first() == Some(&"") {
        lines.remove(0);
    }
    while lines.last() == Some(&"") {
        lines.pop();
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zero_width_and_controls() {
        let raw = "CRP\u{200B} 12\u{0007} mg/L\u{FEFF}";
        assert_eq!(clean_text(raw), "CRP 12 mg/L");
    }

    #[test]
    fn normalizes_line_endings_and_blank_runs() {
        let raw = "Dag 1   \r\n\r\n\r\n\rDag 2\t\r\n";
        assert_eq!(clean_text(raw), "Dag 1\n\nDag 2");
    }

    #[test]
    fn keeps_leading_indentation() {
        assert_eq!(clean_text("Beleid:\n  - CPAP afbouwen"), "Beleid:\n  - CPAP afbouwen");
    }

    #[test]
    fn non_breaking_space_becomes_space() {
        assert_eq!(clean_text("37,5\u{00A0}°C"), "37,5 °C");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(clean_text(" \n\t\n "), "");
    }
}
