use std::collections::VecDeque;

use bitflags::bitflags;
use memchr::{memchr, memchr3};
use tracing::{debug, trace};

use super::{context::OperationContext, shell_error::ShellErrorKind};

bitflags! {
    /// Tweaks for a single expansion pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExpandFlags: u8 {
        /// Leave `$name` and `${name}` references as literal text.
        const SKIP_VARIABLES = 0b0001;
        /// Leave `$(...)` substitutions as literal text.
        const SKIP_CMDSUBST = 0b0010;
        /// Leave wildcard characters as literal text.
        const SKIP_WILDCARDS = 0b0100;
    }
}

/// Expand a line of input into its final words. Words are split on
/// whitespace, then each goes through brace, tilde, dollar, and wildcard
/// expansion. Every potentially unbounded loop below polls the context's
/// cancellation signal, and every produced word counts against its expansion
/// limit.
pub fn expand_string(
    input: &str,
    flags: ExpandFlags,
    ctx: &OperationContext,
) -> Result<Vec<String>, ShellErrorKind> {
    trace!(?flags, %input, "expand");
    expand_words(input, flags, ctx, 0)
}

/// Expand input that must produce exactly one word.
pub fn expand_one(
    input: &str,
    flags: ExpandFlags,
    ctx: &OperationContext,
) -> Result<Option<String>, ShellErrorKind> {
    let mut words = expand_words(input, flags, ctx, 0)?;
    if words.len() == 1 {
        Ok(words.pop())
    } else {
        Ok(None)
    }
}

pub(crate) fn expand_words(
    input: &str,
    flags: ExpandFlags,
    ctx: &OperationContext,
    depth: usize,
) -> Result<Vec<String>, ShellErrorKind> {
    let mut out = Vec::new();
    for word in input.split_whitespace() {
        expand_word(word, flags, ctx, depth, &mut out)?;
    }
    Ok(out)
}

fn expand_word(
    word: &str,
    flags: ExpandFlags,
    ctx: &OperationContext,
    depth: usize,
    out: &mut Vec<String>,
) -> Result<(), ShellErrorKind> {
    if ctx.check_cancel() {
        return Err(ShellErrorKind::Interrupt);
    }
    for braced in expand_braces(word, ctx)? {
        let tilded = expand_tilde(&braced, ctx);
        for expanded in substitute(&tilded, flags, ctx, depth)? {
            if flags.contains(ExpandFlags::SKIP_WILDCARDS)
                || memchr3(b'*', b'?', b'[', expanded.as_bytes()).is_none()
            {
                push_checked(out, expanded, ctx)?;
            } else {
                expand_wildcards(&expanded, ctx, out)?;
            }
        }
    }
    Ok(())
}

// Exceeding the limit aborts the operation, it is never a silent truncation.
fn push_checked(
    out: &mut Vec<String>,
    word: String,
    ctx: &OperationContext,
) -> Result<(), ShellErrorKind> {
    if out.len() >= ctx.expansion_limit {
        debug!(limit = ctx.expansion_limit, "expansion limit exceeded");
        return Err(ShellErrorKind::ExpansionLimit(ctx.expansion_limit));
    }
    out.push(word);
    Ok(())
}

// `{a,b}` alternation. Groups without a top level comma and unclosed groups
// stay literal. Alternatives may contain nested groups, they are requeued and
// rescanned.
fn expand_braces(word: &str, ctx: &OperationContext) -> Result<Vec<String>, ShellErrorKind> {
    if memchr(b'{', word.as_bytes()).is_none() {
        return Ok(vec![word.to_string()]);
    }

    let mut results = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(word.to_string());
    while let Some(current) = queue.pop_front() {
        if ctx.check_cancel() {
            return Err(ShellErrorKind::Interrupt);
        }
        let split = split_brace_group(&current).map(|(prefix, alternatives, suffix)| {
            alternatives
                .iter()
                .map(|alt| format!("{prefix}{alt}{suffix}"))
                .collect::<Vec<_>>()
        });
        match split {
            Some(pieces) => {
                for piece in pieces {
                    if results.len() + queue.len() >= ctx.expansion_limit {
                        return Err(ShellErrorKind::ExpansionLimit(ctx.expansion_limit));
                    }
                    queue.push_back(piece);
                }
            }
            None => results.push(current),
        }
    }
    Ok(results)
}

// Find the first expandable group: a balanced `{...}` containing at least one
// comma at its own nesting level.
fn split_brace_group(word: &str) -> Option<(&str, Vec<&str>, &str)> {
    let bytes = word.as_bytes();
    let mut search = 0;
    while let Some(rel) = memchr(b'{', &bytes[search..]) {
        let open = search + rel;
        let mut depth = 0usize;
        let mut commas = Vec::new();
        let mut close = None;
        for (i, byte) in bytes.iter().copied().enumerate().skip(open) {
            match byte {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                b',' if depth == 1 => commas.push(i),
                _ => {}
            }
        }
        match close {
            Some(close) if !commas.is_empty() => {
                let mut alternatives = Vec::new();
                let mut start = open + 1;
                for comma in commas {
                    alternatives.push(&word[start..comma]);
                    start = comma + 1;
                }
                alternatives.push(&word[start..close]);
                return Some((&word[..open], alternatives, &word[close + 1..]));
            }
            // comma-less group stays literal, but a nested group inside it
            // may still expand
            Some(_) => search = open + 1,
            None => return None,
        }
    }
    None
}

fn expand_tilde(word: &str, ctx: &OperationContext) -> String {
    if let Some(rest) = word.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Some(home) = ctx.vars.get("HOME") {
                return format!("{}{rest}", home.as_string());
            }
        }
    }
    word.to_string()
}

enum Segment {
    Text(String),
    Values(Vec<String>),
}

// One left to right pass over the word, resolving `$name`, `${name}` and
// `$(...)`. Output is never rescanned, so expanded values cannot smuggle in
// further expansions. A word that is exactly one reference keeps its list
// structure: one output word per value.
fn substitute(
    word: &str,
    flags: ExpandFlags,
    ctx: &OperationContext,
    depth: usize,
) -> Result<Vec<String>, ShellErrorKind> {
    let bytes = word.as_bytes();
    if memchr(b'$', bytes).is_none() {
        return Ok(vec![word.to_string()]);
    }
    if ctx.check_cancel() {
        return Err(ShellErrorKind::Interrupt);
    }

    let mut segments: Vec<Segment> = Vec::new();
    let mut cursor = 0;
    while let Some(rel) = memchr(b'$', &bytes[cursor..]) {
        let dollar = cursor + rel;
        if dollar > cursor {
            segments.push(Segment::Text(word[cursor..dollar].to_string()));
        }
        cursor = match bytes.get(dollar + 1).copied() {
            Some(b'(') => {
                let close = find_matching_paren(bytes, dollar + 1);
                if flags.contains(ExpandFlags::SKIP_CMDSUBST) {
                    let end = close.map(|c| c + 1).unwrap_or(bytes.len());
                    segments.push(Segment::Text(word[dollar..end].to_string()));
                    end
                } else {
                    let close = close.ok_or(ShellErrorKind::UnclosedSubstitution)?;
                    if !ctx.has_shell() {
                        return Err(ShellErrorKind::SubstitutionNotAllowed);
                    }
                    let inner = &word[dollar + 2..close];
                    let words = ctx.shell().eval_substitution(inner, flags, ctx, depth + 1)?;
                    segments.push(Segment::Values(words));
                    close + 1
                }
            }
            Some(b'{') => {
                let close = memchr(b'}', &bytes[dollar + 2..]).map(|i| dollar + 2 + i);
                if flags.contains(ExpandFlags::SKIP_VARIABLES) {
                    let end = close.map(|c| c + 1).unwrap_or(bytes.len());
                    segments.push(Segment::Text(word[dollar..end].to_string()));
                    end
                } else {
                    let close = close.ok_or(ShellErrorKind::UnclosedVariable)?;
                    let name = &word[dollar + 2..close];
                    segments.push(lookup(name, ctx)?);
                    close + 1
                }
            }
            Some(c) if is_ident_byte(c) => {
                let end = ident_end(bytes, dollar + 1);
                if flags.contains(ExpandFlags::SKIP_VARIABLES) {
                    segments.push(Segment::Text(word[dollar..end].to_string()));
                } else {
                    segments.push(lookup(&word[dollar + 1..end], ctx)?);
                }
                end
            }
            _ => {
                segments.push(Segment::Text("$".to_string()));
                dollar + 1
            }
        };
    }
    if cursor < word.len() {
        segments.push(Segment::Text(word[cursor..].to_string()));
    }

    if segments.len() == 1 {
        if let Segment::Values(values) = &segments[0] {
            return Ok(values.clone());
        }
    }
    let mut joined = String::new();
    for segment in &segments {
        match segment {
            Segment::Text(text) => joined.push_str(text),
            Segment::Values(values) => joined.push_str(&values.join(" ")),
        }
    }
    Ok(vec![joined])
}

fn lookup(name: &str, ctx: &OperationContext) -> Result<Segment, ShellErrorKind> {
    match ctx.vars.get(name) {
        Some(var) => Ok(Segment::Values(var.as_list().to_vec())),
        None => Err(ShellErrorKind::VariableNotFound(name.to_string())),
    }
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn ident_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|b| !is_ident_byte(*b))
        .map(|i| start + i)
        .unwrap_or(bytes.len())
}

// `open` must point at a `(`.
fn find_matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, byte) in bytes.iter().copied().enumerate().skip(open) {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn expand_wildcards(
    pattern: &str,
    ctx: &OperationContext,
    out: &mut Vec<String>,
) -> Result<(), ShellErrorKind> {
    let mut matched = false;
    for entry in glob::glob(pattern)? {
        if ctx.check_cancel() {
            return Err(ShellErrorKind::Interrupt);
        }
        let path = entry?;
        matched = true;
        push_checked(out, path.to_string_lossy().into_owned(), ctx)?;
    }
    if !matched {
        return Err(ShellErrorKind::NoMatch(pattern.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_group_splitting() {
        let (prefix, alts, suffix) = split_brace_group("a{b,c}d").unwrap();
        assert_eq!(prefix, "a");
        assert_eq!(alts, vec!["b", "c"]);
        assert_eq!(suffix, "d");

        // comma-less and unclosed groups are literal
        assert!(split_brace_group("a{b}d").is_none());
        assert!(split_brace_group("a{bd").is_none());

        // nested commas belong to the inner group
        let (prefix, alts, _) = split_brace_group("{a{1,2},b}").unwrap();
        assert_eq!(prefix, "");
        assert_eq!(alts, vec!["a{1,2}", "b"]);

        // a comma-less outer group does not hide an inner group
        let (prefix, alts, suffix) = split_brace_group("{x{1,2}}").unwrap();
        assert_eq!(prefix, "{x");
        assert_eq!(alts, vec!["1", "2"]);
        assert_eq!(suffix, "}");
    }

    #[test]
    fn matching_paren() {
        let bytes = b"$(a(b)c)d";
        assert_eq!(find_matching_paren(bytes, 1), Some(7));
        assert_eq!(find_matching_paren(b"$(abc", 1), None);
    }

    #[test]
    fn ident_scanning() {
        let bytes = b"name-rest";
        assert_eq!(ident_end(bytes, 0), 4);
        assert_eq!(ident_end(b"name", 0), 4);
    }
}
