//! Regex substitution rules applied to every received line.
//!
//! Templates use backslash syntax: `\1`, `\g<1>` and `\g<name>` refer to
//! groups, `\n`, `\t`, `\xhh` and octal escapes such as `\033` stand for
//! characters, `\\` is a literal backslash. A `$` is always literal.

use regex::Regex;
use std::iter::Peekable;
use std::str::Chars;

/// A compiled pattern and its replacement template
#[derive(Debug, Clone)]
pub struct HighlightRule {
    pattern: Regex,
    template: String,
}

impl HighlightRule {
    /// Compile a rule. Every group the template refers to must exist in the pattern.
    pub fn new(pattern: &str, template: &str) -> Result<Self, String> {
        let pattern = Regex::new(pattern)
            .map_err(|e| format!("Invalid highlight pattern '{}': {}", pattern, e))?;
        let template = translate_template(template, &pattern)
            .map_err(|e| format!("Invalid highlight template '{}': {}", template, e))?;
        Ok(Self { pattern, template })
    }

    pub fn apply(&self, line: &str) -> String {
        self.pattern
            .replace_all(line, self.template.as_str())
            .into_owned()
    }
}

/// Ordered list of highlight rules
#[derive(Debug, Clone, Default)]
pub struct Highlighter {
    rules: Vec<HighlightRule>,
}

impl Highlighter {
    /// Build from (pattern, template) pairs, keeping their order
    pub fn from_pairs<I, P, T>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (P, T)>,
        P: AsRef<str>,
        T: AsRef<str>,
    {
        let rules = pairs
            .into_iter()
            .map(|(pattern, template)| HighlightRule::new(pattern.as_ref(), template.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Run every rule over the whole line; each rule sees the previous rule's output.
    pub fn apply(&self, line: &str) -> String {
        self.rules
            .iter()
            .fold(line.to_string(), |line, rule| rule.apply(&line))
    }
}

/// Rewrite a backslash template into `regex` replacement syntax.
fn translate_template(template: &str, pattern: &Regex) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => {
                out.push_str("$$");
                continue;
            }
            '\\' => {}
            _ => {
                out.push(c);
                continue;
            }
        }

        let Some(escape) = chars.next() else {
            return Err("trailing backslash".to_string());
        };

        match escape {
            'g' => {
                let group = named_group(&mut chars)?;
                push_group(&mut out, &group, pattern)?;
            }
            '0' => {
                let mut code = 0;
                for _ in 0..2 {
                    match chars.next_if(is_octal_digit) {
                        Some(digit) => code = code * 8 + digit.to_digit(8).unwrap_or(0),
                        None => break,
                    }
                }
                out.push(octal_char(code)?);
            }
            '1'..='9' => {
                let mut group = escape.to_string();
                if let Some(second) = chars.next_if(char::is_ascii_digit) {
                    group.push(second);
                    if is_octal_digit(&escape) && is_octal_digit(&second) {
                        if let Some(third) = chars.next_if(is_octal_digit) {
                            group.push(third);
                            let code = u32::from_str_radix(&group, 8)
                                .map_err(|e| format!("bad octal escape \\{}: {}", group, e))?;
                            out.push(octal_char(code)?);
                            continue;
                        }
                    }
                }
                push_group(&mut out, &group, pattern)?;
            }
            'x' => {
                let mut code = 0;
                for _ in 0..2 {
                    let digit = chars
                        .next()
                        .and_then(|d| d.to_digit(16))
                        .ok_or_else(|| "incomplete \\x escape".to_string())?;
                    code = code * 16 + digit;
                }
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '\\' => out.push('\\'),
            other if other.is_ascii_alphabetic() => {
                return Err(format!("bad escape \\{}", other));
            }
            '$' => out.push_str("\\$$"),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}

fn is_octal_digit(c: &char) -> bool {
    matches!(c, '0'..='7')
}

fn octal_char(code: u32) -> Result<char, String> {
    if code > 0o377 {
        return Err(format!("octal escape value \\{:o} outside of range 0-0o377", code));
    }
    char::from_u32(code).ok_or_else(|| format!("invalid character code {:#o}", code))
}

/// Parse the `<name>` part of a `\g<name>` reference
fn named_group(chars: &mut Peekable<Chars<'_>>) -> Result<String, String> {
    if chars.next() != Some('<') {
        return Err("missing < after \\g".to_string());
    }
    let mut group = String::new();
    loop {
        match chars.next() {
            Some('>') => break,
            Some(ch) => group.push(ch),
            None => return Err("missing >, unterminated name".to_string()),
        }
    }
    if group.is_empty() {
        return Err("missing group name".to_string());
    }
    Ok(group)
}

fn push_group(out: &mut String, group: &str, pattern: &Regex) -> Result<(), String> {
    let exists = match group.parse::<usize>() {
        Ok(index) => index < pattern.captures_len(),
        Err(_) => pattern.capture_names().flatten().any(|name| name == group),
    };
    if !exists {
        return Err(format!("invalid group reference {}", group));
    }
    out.push_str(&format!("${{{}}}", group));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn apply(pattern: &str, template: &str, line: &str) -> String {
        Highlighter::from_pairs([(pattern, template)]).unwrap().apply(line)
    }

    #[test]
    fn test_empty_highlighter_is_identity() {
        let highlighter = Highlighter::default();
        assert_eq!(highlighter.apply("boot ok"), "boot ok");
    }

    #[test]
    fn test_rules_apply_in_order() {
        let highlighter =
            Highlighter::from_pairs([("ERROR", "FAIL"), ("FAIL", "<<FAIL>>")]).unwrap();
        assert_eq!(highlighter.apply("ERROR: x"), "<<FAIL>>: x");

        let reversed =
            Highlighter::from_pairs([("FAIL", "<<FAIL>>"), ("ERROR", "FAIL")]).unwrap();
        assert_eq!(reversed.apply("ERROR: x"), "FAIL: x");
    }

    #[test]
    fn test_replaces_every_match() {
        assert_eq!(apply("o", "0", "foo boo"), "f00 b00");
    }

    #[test]
    fn test_back_references() {
        assert_eq!(apply(r"temp=(\d+)", r"temp=[\1]", "temp=42"), "temp=[42]");
        assert_eq!(apply(r"(?P<key>\w+):", r"\g<key> ->", "status: up"), "status -> up");
        assert_eq!(apply(r"id (?P<n>\d+)", r"#\g<n>", "id 7"), "#7");
        assert_eq!(apply(r"ab", r"<\g<0>>", "xaby"), "x<ab>y");
    }

    #[test]
    fn test_two_digit_group_reference() {
        let pattern = "(a)(b)(c)(d)(e)(f)(g)(h)(i)(j)(k)(l)";
        assert_eq!(apply(pattern, r"\12\1", "abcdefghijkl"), "la");
        // \128: group 12, then a literal 8
        assert_eq!(apply(pattern, r"\128", "abcdefghijkl"), "l8");
    }

    #[test]
    fn test_ansi_colouring() {
        assert_eq!(
            apply("ERROR", r"\033[31m\g<0>\033[0m", "an ERROR"),
            "an \x1b[31mERROR\x1b[0m"
        );
        assert_eq!(apply("(ERROR)", r"\x1b[1m\1\x1b[0m", "ERROR"), "\x1b[1mERROR\x1b[0m");
    }

    #[test]
    fn test_octal_escapes() {
        assert_eq!(apply("x", r"\0", "x"), "\0");
        assert_eq!(apply("x", r"\012", "x"), "\n");
        assert_eq!(apply("x", r"\101\102", "x"), "AB");
        assert!(Highlighter::from_pairs([("x", r"\477")]).is_err());
    }

    #[test]
    fn test_character_escapes() {
        assert_eq!(apply("x", r"a\tb", "x"), "a\tb");
        assert_eq!(apply("x", r"a\nb\r", "x"), "a\nb\r");
        assert_eq!(apply("x", r"\a\b\f\v", "x"), "\x07\x08\x0c\x0b");
        assert_eq!(apply("x", r"\x41", "x"), "A");
        assert!(Highlighter::from_pairs([("x", r"\x4")]).is_err());
    }

    #[test]
    fn test_dollar_is_literal() {
        assert_eq!(apply("ERR", "[$ERR]", "ERR"), "[$ERR]");
        assert_eq!(apply("(v)", "$1 ${1} $$", "v"), "$1 ${1} $$");
        assert_eq!(apply("p", r"\$", "p"), r"\$");
    }

    #[test]
    fn test_literal_backslash_in_template() {
        assert_eq!(apply("/", r"\\", "a/b"), r"a\b");
        assert_eq!(apply("x", r"\[", "x"), r"\[");
    }

    #[test]
    fn test_invalid_rules_rejected() {
        assert!(Highlighter::from_pairs([("(unclosed", "x")]).is_err());
        assert!(Highlighter::from_pairs([("(?P<n>a)", r"\g<n")]).is_err());
        assert!(Highlighter::from_pairs([("a", r"\gn")]).is_err());
        assert!(Highlighter::from_pairs([("a", r"\g<>")]).is_err());
        assert!(Highlighter::from_pairs([("a", r"\q")]).is_err());
        assert!(Highlighter::from_pairs([("a", "x\\")]).is_err());
    }

    #[test]
    fn test_missing_group_rejected() {
        let err = Highlighter::from_pairs([("(a)", r"\2")]).unwrap_err();
        assert!(err.contains("invalid group reference 2"));
        assert!(Highlighter::from_pairs([("(a)", r"\g<name>")]).is_err());
        assert!(Highlighter::from_pairs([("(?P<name>a)", r"\g<name>\g<1>")]).is_ok());
    }

    proptest! {
        #[test]
        fn prop_non_overlapping_rules_idempotent(line in "[a-z ]{0,40}") {
            // Replacements share no characters with any pattern
            let highlighter = Highlighter::from_pairs([
                ("a+", "[A]"),
                ("e", "<E>"),
                ("xyz", "#"),
            ]).unwrap();
            let once = highlighter.apply(&line);
            prop_assert_eq!(highlighter.apply(&once), once);
        }
    }
}
