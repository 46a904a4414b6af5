//! Reader and writer for the `key=value` cache file.
//!
//! The format is compatible with Java `.properties` files so a cache written by
//! older tooling can still be read: `#`/`!` comments, `=`, `:` or whitespace as
//! the separator, backslash escapes, and backslash line continuations.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Parse properties text into an ordered map. Malformed lines never fail;
/// later keys override earlier ones.
#[must_use]
pub fn parse(text: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    let mut lines = text.lines();

    while let Some(first) = lines.next() {
        let mut logical = first.trim_start().to_string();
        if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
            continue;
        }

        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        entries.insert(unescape(key), unescape(value));
    }

    entries
}

/// Render a map as properties text, headed by a comment line
#[must_use]
pub fn render(entries: &BTreeMap<String, String>, comment: &str) -> String {
    let mut out = String::new();
    for line in comment.lines() {
        let _ = writeln!(out, "#{line}");
    }
    for (key, value) in entries {
        let _ = writeln!(out, "{}={}", escape(key, true), escape(value, false));
    }
    out
}

fn ends_with_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
    trailing % 2 == 1
}

/// Split a logical line at the first unescaped separator
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], line[i + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..i], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape(s: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_and_comments() {
        let text = "#Mon Jan 01 00:00:00 UTC 2024\n\
                    ! another comment\n\
                    \n\
                    /dll/ngs-sdk/64/loaded/path=/home/u/.ncbi/lib64/libngs-sdk.so\n\
                    /dll/ngs-sdk/64/loaded/version = 2.9.0\n";
        let entries = parse(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries["/dll/ngs-sdk/64/loaded/path"],
            "/home/u/.ncbi/lib64/libngs-sdk.so"
        );
        assert_eq!(entries["/dll/ngs-sdk/64/loaded/version"], "2.9.0");
    }

    #[test]
    fn test_parse_java_escaped_windows_path() {
        let text = "/dll/ncbi-vdb/64/saved/path=C\\:\\\\Users\\\\me\\\\ncbi-vdb.dll\n";
        let entries = parse(text);
        assert_eq!(
            entries["/dll/ncbi-vdb/64/saved/path"],
            "C:\\Users\\me\\ncbi-vdb.dll"
        );
    }

    #[test]
    fn test_parse_colon_and_space_separators() {
        let entries = parse("a:1\nb 2\nc   :   3\n");
        assert_eq!(entries["a"], "1");
        assert_eq!(entries["b"], "2");
        assert_eq!(entries["c"], "3");
    }

    #[test]
    fn test_parse_line_continuation() {
        let entries = parse("key=first\\\n    second\n");
        assert_eq!(entries["key"], "firstsecond");
    }

    #[test]
    fn test_parse_unicode_escape() {
        let entries = parse("k=caf\\u00e9\n");
        assert_eq!(entries["k"], "café");
    }

    #[test]
    fn test_render_then_parse_preserves_awkward_values() {
        let mut entries = BTreeMap::new();
        entries.insert("/dll/x/64/saved/path".to_string(), "C:\\tmp\\x y.dll".to_string());
        entries.insert("/servers/sratoolkit-cgi".to_string(), "http://h:8080/cgi?a=b".to_string());
        entries.insert("leading".to_string(), " space".to_string());

        let text = render(&entries, "written by a test");
        assert!(text.starts_with("#written by a test\n"));
        assert_eq!(parse(&text), entries);
    }
}
