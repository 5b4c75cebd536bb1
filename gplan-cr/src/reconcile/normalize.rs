//! Variety name normalization
//!
//! Two strictness levels that deliberately catch different duplicate classes:
//!
//! - [`light`]: case, whitespace, curly quotes, one trailing period.
//!   `"Brandywine"` and `"brandywine."` collide.
//! - [`strict`]: light, then bracketed qualifiers and all punctuation removed.
//!   `"Sungold (organic)"` and `"Sungold"` collide; so do `"Mr. Stripey"`
//!   and `"Mr Stripey"`.

/// Light normalization used by repair, diagnostics and name-mode merging
pub fn light(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    let mut collapsed = String::with_capacity(lowered.len());
    for word in lowered.split_whitespace() {
        if !collapsed.is_empty() {
            collapsed.push(' ');
        }
        collapsed.push_str(word);
    }

    let mut out: String = collapsed.chars().map(straighten_quote).collect();
    if out.ends_with('.') {
        out.pop();
        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
    }
    out
}

/// Strict normalization used by the dedicated dedup view
pub fn strict(name: &str) -> String {
    let base = strip_bracketed(&light(name));
    let kept: String = base
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Light normalization of an optional name; missing yields `""`
pub fn light_opt(name: Option<&str>) -> String {
    name.map(light).unwrap_or_default()
}

fn straighten_quote(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
        other => other,
    }
}

/// Remove `(...)` and `[...]` spans; an unclosed bracket runs to the end
fn strip_bracketed(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut closers: Vec<char> = Vec::new();
    for c in s.chars() {
        match c {
            '(' => closers.push(')'),
            '[' => closers.push(']'),
            ')' | ']' if closers.last() == Some(&c) => {
                closers.pop();
                out.push(' ');
            }
            _ if closers.is_empty() => out.push(c),
            _ => {}
        }
    }
    out
}
