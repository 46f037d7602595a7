// Plain-text extraction from the RTF payloads system B stores in its
// section text column. Handles the subset those exports use: groups,
// control words, hex escapes (cp1252) and \u unicode escapes.

/// Destinations whose content is never visible text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "footer",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "xmlnstbl",
    "themedata",
    "datastore",
    "latentstyles",
];

/// True when the payload starts with an RTF header.
pub fn is_rtf(text: &str) -> bool {
    text.trim_start().starts_with("{\\rtf")
}

/// Convert RTF to plain text. Non-RTF input is returned unchanged.
pub fn rtf_to_text(input: &str) -> String {
    if !is_rtf(input) {
        return input.to_string();
    }

    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() / 2);
    // Per group: (skipping, unicode fallback chars to drop after \uN)
    let mut stack: Vec<(bool, usize)> = Vec::new();
    let mut skipping = false;
    let mut uc_skip = 1usize;
    let mut pending_skip = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                stack.push((skipping, uc_skip));
                i += 1;
                // "{\*" marks an ignorable destination
                if chars.get(i) == Some(&'\\') && chars.get(i + 1) == Some(&'*') {
                    skipping = true;
                }
            }
            '}' => {
                if let Some((prev_skipping, prev_uc)) = stack.pop() {
                    skipping = prev_skipping;
                    uc_skip = prev_uc;
                }
                i += 1;
            }
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };
                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    let num_start = i;
                    if i < chars.len() && (chars[i] == '-' || chars[i].is_ascii_digit()) {
                        i += 1;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                    let param: Option<i32> = chars[num_start..i].iter().collect::<String>().parse().ok();
                    // A single space delimits the control word
                    if chars.get(i) == Some(&' ') {
                        i += 1;
                    }

                    if SKIPPED_DESTINATIONS.contains(&word.as_str()) {
                        skipping = true;
                        continue;
                    }
                    if skipping {
                        continue;
                    }
                    match word.as_str() {
                        "par" | "line" | "row" => out.push('\n'),
                        "tab" | "cell" => out.push('\t'),
                        "emdash" => out.push('\u{2014}'),
                        "endash" => out.push('\u{2013}'),
                        "bullet" => out.push('\u{2022}'),
                        "lquote" => out.push('\u{2018}'),
                        "rquote" => out.push('\u{2019}'),
                        "ldblquote" => out.push('\u{201C}'),
                        "rdblquote" => out.push('\u{201D}'),
                        "uc" => uc_skip = param.unwrap_or(1).max(0) as usize,
                        "u" => {
                            if let Some(code) = param {
                                // Negative values encode code points above 32767
                                let code = if code < 0 { code + 65536 } else { code };
                                if let Some(ch) = char::from_u32(code as u32) {
                                    out.push(ch);
                                }
                                pending_skip = uc_skip;
                            }
                        }
                        _ => {}
                    }
                } else {
                    match next {
                        '\'' => {
                            let hex: String = chars.iter().skip(i + 1).take(2).collect();
                            i += 1 + hex.len();
                            if skipping {
                                continue;
                            }
                            if pending_skip > 0 {
                                pending_skip -= 1;
                                continue;
                            }
                            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                out.push(cp1252_to_char(byte));
                            }
                        }
                        '\\' | '{' | '}' => {
                            i += 1;
                            if !skipping {
                                out.push(next);
                            }
                        }
                        '~' => {
                            i += 1;
                            if !skipping {
                                out.push(' ');
                            }
                        }
                        '\n' | '\r' => {
                            i += 1;
                            if !skipping {
                                out.push('\n');
                            }
                        }
                        _ => i += 1,
                    }
                }
            }
            '\r' | '\n' => i += 1,
            _ => {
                i += 1;
                if skipping {
                    continue;
                }
                if pending_skip > 0 {
                    pending_skip -= 1;
                    continue;
                }
                out.push(c);
            }
        }
    }

    out
}

/// Windows-1252 byte to char. Bytes 0x80..0x9F differ from Latin-1.
fn cp1252_to_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
        '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
        '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
        '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}
