//! Lightweight syntax checks for code blocks in lesson content
//!
//! These are structural checks (balanced delimiters, terminated literals,
//! Python block headers), not full parsers.

use regex::Regex;
use std::sync::OnceLock;

/// Outcome of checking one code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxVerdict {
    Valid,
    Invalid(String),
    /// No checker exists for the language; excluded from failure ratios
    Unsupported,
}

impl SyntaxVerdict {
    pub fn is_checkable(&self) -> bool {
        !matches!(self, SyntaxVerdict::Unsupported)
    }
}

/// Check `source` written in `language`
pub fn check(language: &str, source: &str) -> SyntaxVerdict {
    match language.trim().to_lowercase().as_str() {
        "rust" | "rs" => check_c_like(source, true),
        "c" | "cpp" | "c++" | "csharp" | "c#" | "go" | "java" | "javascript" | "js" | "kotlin"
        | "php" | "scala" | "swift" | "typescript" | "ts" => check_c_like(source, false),
        "python" | "py" | "python3" => check_python(source),
        "json" => match serde_json::from_str::<serde_json::Value>(source) {
            Ok(_) => SyntaxVerdict::Valid,
            Err(e) => SyntaxVerdict::Invalid(format!("invalid JSON: {}", e)),
        },
        _ => SyntaxVerdict::Unsupported,
    }
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Push/pop a delimiter; returns an error message on mismatch
fn track_delimiter(
    stack: &mut Vec<(char, usize)>,
    c: char,
    line: usize,
) -> Result<(), String> {
    match c {
        '(' | '[' | '{' => {
            stack.push((c, line));
            Ok(())
        }
        ')' | ']' | '}' => match stack.pop() {
            Some((open, _)) if closing_for(open) == c => Ok(()),
            Some((open, open_line)) => Err(format!(
                "line {}: '{}' does not close '{}' opened on line {}",
                line, c, open, open_line
            )),
            None => Err(format!("line {}: unexpected '{}'", line, c)),
        },
        _ => Ok(()),
    }
}

/// Delimiter balance for C-family languages, skipping strings and comments
fn check_c_like(source: &str, rust_lifetimes: bool) -> SyntaxVerdict {
    let chars: Vec<char> = source.chars().collect();
    let mut stack = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\n' => line += 1,
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if next == Some('*') => {
                let start = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => {
                            return SyntaxVerdict::Invalid(format!(
                                "line {}: unterminated block comment",
                                start
                            ))
                        }
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => line += 1,
                        Some(_) => {}
                    }
                    i += 1;
                }
                continue;
            }
            '\'' if rust_lifetimes && !is_char_literal(&chars, i) => {}
            '"' | '\'' | '`' => {
                let start = line;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return SyntaxVerdict::Invalid(format!(
                                "line {}: unterminated string literal",
                                start
                            ))
                        }
                        Some('\\') => i += 1,
                        Some('\n') if c != '`' && !rust_lifetimes => {
                            return SyntaxVerdict::Invalid(format!(
                                "line {}: unterminated string literal",
                                start
                            ))
                        }
                        Some('\n') => line += 1,
                        Some(q) if *q == c => break,
                        Some(_) => {}
                    }
                    i += 1;
                }
            }
            _ => {
                if let Err(message) = track_delimiter(&mut stack, c, line) {
                    return SyntaxVerdict::Invalid(message);
                }
            }
        }
        i += 1;
    }

    match stack.last() {
        Some((open, open_line)) => {
            SyntaxVerdict::Invalid(format!("line {}: unclosed '{}'", open_line, open))
        }
        None => SyntaxVerdict::Valid,
    }
}

/// Distinguish `'x'` / `'\n'` from a Rust lifetime such as `'a`
fn is_char_literal(chars: &[char], quote: usize) -> bool {
    match chars.get(quote + 1) {
        Some('\\') => true,
        Some(_) => chars.get(quote + 2) == Some(&'\''),
        None => false,
    }
}

/// Statement that opens a Python block and must end with ':'
fn py_block_header() -> Option<&'static Regex> {
    static BLOCK_HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    BLOCK_HEADER
        .get_or_init(|| {
            Regex::new(
                r"^(?:async\s+)?(?:class|def|elif|else|except|finally|for|if|try|while|with)\b",
            )
            .ok()
        })
        .as_ref()
}

/// A logical Python statement being scanned (may span lines)
struct PyStatement {
    line: usize,
    indent: usize,
    is_block: bool,
}

fn check_python(source: &str) -> SyntaxVerdict {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut in_triple: Option<(char, usize)> = None;
    let mut statement: Option<PyStatement> = None;
    // Header line and indent of a block still waiting for its body
    let mut awaiting_body: Option<(usize, usize)> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let starts_in_string = in_triple.is_some();
        let chars: Vec<char> = raw.chars().collect();
        let mut code = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if let Some((q, _)) = in_triple {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == q && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                    in_triple = None;
                    code.push('_');
                    i += 3;
                    continue;
                }
                i += 1;
                continue;
            }
            match c {
                '#' => break,
                '"' | '\'' => {
                    if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                        in_triple = Some((c, line));
                        i += 3;
                        continue;
                    }
                    let mut j = i + 1;
                    let mut closed = false;
                    while j < chars.len() {
                        if chars[j] == '\\' {
                            j += 2;
                            continue;
                        }
                        if chars[j] == c {
                            closed = true;
                            break;
                        }
                        j += 1;
                    }
                    if !closed {
                        return SyntaxVerdict::Invalid(format!(
                            "line {}: unterminated string literal",
                            line
                        ));
                    }
                    code.push('_');
                    i = j + 1;
                    continue;
                }
                _ => {
                    if let Err(message) = track_delimiter(&mut stack, c, line) {
                        return SyntaxVerdict::Invalid(message);
                    }
                }
            }
            code.push(c);
            i += 1;
        }

        let trimmed = code.trim();
        if trimmed.is_empty() && statement.is_none() {
            continue;
        }

        if statement.is_none() && !starts_in_string {
            let indent = raw.chars().take_while(|c| c.is_whitespace()).count();
            if let Some((header, header_indent)) = awaiting_body.take() {
                if indent <= header_indent {
                    return SyntaxVerdict::Invalid(format!(
                        "line {}: expected an indented block after line {}",
                        line, header
                    ));
                }
            }
            statement = Some(PyStatement {
                line,
                indent,
                is_block: py_block_header().is_some_and(|re| re.is_match(trimmed)),
            });
        }

        let continued = !stack.is_empty() || in_triple.is_some() || trimmed.ends_with('\\');
        if continued {
            continue;
        }
        if let Some(done) = statement.take() {
            if done.is_block {
                if trimmed.ends_with(':') {
                    awaiting_body = Some((done.line, done.indent));
                } else if !code.contains(':') {
                    return SyntaxVerdict::Invalid(format!(
                        "line {}: block statement is missing ':'",
                        done.line
                    ));
                }
            }
        }
    }

    if let Some((_, start)) = in_triple {
        return SyntaxVerdict::Invalid(format!("line {}: unterminated triple-quoted string", start));
    }
    if let Some((open, open_line)) = stack.last() {
        return SyntaxVerdict::Invalid(format!("line {}: unclosed '{}'", open_line, open));
    }
    if let Some((header, _)) = awaiting_body {
        return SyntaxVerdict::Invalid(format!(
            "line {}: expected an indented block at end of input",
            header
        ));
    }
    SyntaxVerdict::Valid
}
