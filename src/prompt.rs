//! Shell-prompt detector: recognizes the tail of a rendered screen as a
//! shell prompt, a REPL prompt, or neither.
//!
//! `cco` itself has no prompt-detection code to ground this in directly, so
//! the regex-bank construction (a `once_cell::sync::Lazy<Vec<Regex>>`
//! compiled once at first use) is borrowed from the
//! `misterclayt0n-the-editor` example's use of `once_cell` for lazily-built
//! static tables, applied here to the small prompt-pattern bank
//! `SPEC_FULL.md` section 4.5 calls for.

use once_cell::sync::Lazy;
use regex::Regex;

/// What kind of interactive prompt the last line of the screen looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Shell,
    Python,
    Pdb,
    None,
    Unknown,
}

static SHELL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // user@host:path$  /  user@host:path#
        Regex::new(r"^[\w.\-]+@[\w.\-]+:[^$#%>]*[$#]\s*$").unwrap(),
        // plain $, #, % trailing prompt with optional trailing space
        Regex::new(r"^\s*[%#$>]\s*$").unwrap(),
        // zsh-style "path %"
        Regex::new(r"^[^\n]*\s%\s*$").unwrap(),
    ]
});

static PYTHON_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^>>>\s*$").unwrap(),
        Regex::new(r"^\.\.\.\s*$").unwrap(),
    ]
});

static PDB_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"^\(Pdb\)\s*$").unwrap(), Regex::new(r"^ipdb>\s*$").unwrap()]);

/// Detect the prompt kind from the last non-blank line of a rendered
/// screen. `custom` lets a session override/add a pattern (e.g. a
/// project-specific PS1) ahead of the built-in bank.
pub fn detect(last_line: &str, custom: Option<&Regex>) -> PromptKind {
    let trimmed = last_line.trim_end();
    if trimmed.is_empty() {
        return PromptKind::None;
    }
    if let Some(re) = custom {
        if re.is_match(trimmed) {
            return PromptKind::Shell;
        }
    }
    if PDB_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
        return PromptKind::Pdb;
    }
    if PYTHON_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
        return PromptKind::Python;
    }
    if SHELL_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
        return PromptKind::Shell;
    }
    PromptKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bash_style_prompt() {
        assert_eq!(detect("user@host:~/project$ ", None), PromptKind::Shell);
    }

    #[test]
    fn detects_python_repl() {
        assert_eq!(detect(">>> ", None), PromptKind::Python);
    }

    #[test]
    fn detects_pdb_prompt() {
        assert_eq!(detect("(Pdb) ", None), PromptKind::Pdb);
    }

    #[test]
    fn blank_line_is_none() {
        assert_eq!(detect("   ", None), PromptKind::None);
    }

    #[test]
    fn arbitrary_output_is_unknown() {
        assert_eq!(detect("Downloading package...", None), PromptKind::Unknown);
    }

    #[test]
    fn custom_pattern_takes_precedence() {
        let re = Regex::new(r"^myapp> $").unwrap();
        assert_eq!(detect("myapp> ", Some(&re)), PromptKind::Shell);
    }
}
