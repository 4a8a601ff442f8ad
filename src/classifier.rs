//! State classifier: turns a rendered screen plus prompt classification
//! into the wire-stable `Status` the session returns to callers.
//!
//! Priority order is exactly spec.md section 4.6's list; nothing here is
//! grounded in a single teacher file (cco has no equivalent heuristic) but
//! the regex-cue tables follow the same `once_cell::sync::Lazy` idiom used
//! in `prompt.rs`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::emulator::Modes;
use crate::prompt::{self, PromptKind};
use crate::status::Status;

/// External, optional hook consulted only when every built-in rule falls
/// through to `Unknown`. The core never ships a default implementor.
pub trait StatusSampler: Send + Sync {
    fn sample(&self, screen: &str, scrollback: &str) -> Option<Status>;
}

static PASSWORD_CUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(password|passphrase|enter key for)\s*:?\s*$").unwrap());

static CONFIRM_CUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\[y/n\]|\[yes/no\]|\(y/n\)|\(yes/no\))\s*:?\s*$").unwrap());

static ERROR_CUES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)traceback \(most recent call last\)").unwrap(),
        Regex::new(r"(?i)command not found").unwrap(),
        Regex::new(r"(?i)^error[: ]").unwrap(),
        Regex::new(r"(?i)panicked at").unwrap(),
    ]
});

static REPL_PROMPT_CUES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^In \[\d+\]:\s*$").unwrap(),
        Regex::new(r"^mysql>\s*$").unwrap(),
        Regex::new(r"^irb\([^)]*\)[>*]\s*$").unwrap(),
    ]
});

static PAGER_CUES: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"^:\s*$").unwrap(), Regex::new(r"\(END\)\s*$").unwrap(), Regex::new(r"lines \d+-\d+/\d+").unwrap()]);

/// What fed into the classification decision, returned alongside the
/// status as `state_reason`.
pub struct Classification {
    pub status: Status,
    pub reason: String,
}

fn last_nonblank_line(lines: &[String]) -> &str {
    lines
        .iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|s| s.as_str())
        .unwrap_or("")
}

/// Classify the current screen. `recent_output` is the text produced since
/// the last poll (used for the error-banner cue, which should not fire on
/// stale screen content from long before the current turn). `had_recent_output`
/// tells rule 8 (`running`) apart from rule 9 (`unknown`).
pub fn classify(
    lines: &[String],
    recent_output: &str,
    had_recent_output: bool,
    modes: Modes,
    prompt_override: Option<&Regex>,
    sampler: Option<&dyn StatusSampler>,
) -> Classification {
    let last_line = last_nonblank_line(lines);
    let screen_text = lines.join("\n");

    if PASSWORD_CUE.is_match(last_line.trim_end()) {
        return Classification {
            status: Status::Password,
            reason: "last line matches a password/passphrase cue".into(),
        };
    }

    if CONFIRM_CUE.is_match(last_line.trim_end()) {
        return Classification {
            status: Status::Confirm,
            reason: "last line asks for a yes/no-like confirmation".into(),
        };
    }

    if ERROR_CUES.iter().any(|re| re.is_match(recent_output)) {
        return Classification {
            status: Status::Error,
            reason: "recent output contains an error banner".into(),
        };
    }

    let prompt_kind = prompt::detect(last_line, prompt_override);
    if matches!(prompt_kind, PromptKind::Python | PromptKind::Pdb)
        || REPL_PROMPT_CUES.iter().any(|re| re.is_match(last_line.trim_end()))
    {
        return Classification {
            status: Status::Repl,
            reason: "prompt looks like an interactive REPL".into(),
        };
    }

    if modes.alternate_screen {
        if looks_like_editor_status_line(last_line) {
            return Classification {
                status: Status::Editor,
                reason: "alternate screen with a modal editor status line".into(),
            };
        }
        if PAGER_CUES.iter().any(|re| re.is_match(last_line.trim_end())) {
            return Classification {
                status: Status::Pager,
                reason: "alternate screen with a pager-style status line".into(),
            };
        }
    }

    if prompt_kind == PromptKind::Shell {
        return Classification {
            status: Status::Ready,
            reason: "prompt detector recognized a shell prompt".into(),
        };
    }

    if had_recent_output {
        return Classification {
            status: Status::Running,
            reason: "output produced recently but no prompt or cue matched".into(),
        };
    }

    if let Some(sampler) = sampler {
        if let Some(status) = sampler.sample(&screen_text, recent_output) {
            return Classification {
                status,
                reason: "external sampler resolved an ambiguous screen".into(),
            };
        }
    }

    Classification {
        status: Status::Unknown,
        reason: "no classification rule matched".into(),
    }
}

/// Heuristic for a modal editor's status/ruler line: vim/nano/emacs all
/// tend to end their bottom line with a `--INSERT--`-style mode indicator
/// or a `L,C` position marker.
fn looks_like_editor_status_line(line: &str) -> bool {
    static EDITOR_CUE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)(--insert--|--visual--|\bmodified\b|\d+,\d+\s*(all|top|bot|\d+%))").unwrap());
    EDITOR_CUE.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::Modes;

    fn modes(alt: bool) -> Modes {
        Modes {
            alternate_screen: alt,
            ..Modes::default()
        }
    }

    #[test]
    fn password_cue_wins_over_everything() {
        let lines = vec!["Password: ".to_string()];
        let c = classify(&lines, "", true, modes(false), None, None);
        assert_eq!(c.status, Status::Password);
    }

    #[test]
    fn confirm_cue() {
        let lines = vec!["Proceed? [y/N] ".to_string()];
        let c = classify(&lines, "", true, modes(false), None, None);
        assert_eq!(c.status, Status::Confirm);
    }

    #[test]
    fn error_banner_outranks_ready_prompt() {
        let lines = vec!["bash: frobnicate: command not found".to_string(), "user@host:~$ ".to_string()];
        let c = classify(&lines, "bash: frobnicate: command not found", true, modes(false), None, None);
        assert_eq!(c.status, Status::Error);
    }

    #[test]
    fn python_repl() {
        let lines = vec![">>> ".to_string()];
        let c = classify(&lines, "", true, modes(false), None, None);
        assert_eq!(c.status, Status::Repl);
    }

    #[test]
    fn pager_on_alt_screen() {
        let lines = vec!["some content".to_string(), ":".to_string()];
        let c = classify(&lines, "", true, modes(true), None, None);
        assert_eq!(c.status, Status::Pager);
    }

    #[test]
    fn ready_shell_prompt() {
        let lines = vec!["user@host:~/project$ ".to_string()];
        let c = classify(&lines, "", true, modes(false), None, None);
        assert_eq!(c.status, Status::Ready);
    }

    #[test]
    fn running_when_no_cue_but_recent_output() {
        let lines = vec!["compiling...".to_string()];
        let c = classify(&lines, "compiling...", true, modes(false), None, None);
        assert_eq!(c.status, Status::Running);
    }

    #[test]
    fn unknown_falls_back_to_sampler() {
        struct FixedSampler;
        impl StatusSampler for FixedSampler {
            fn sample(&self, _screen: &str, _scrollback: &str) -> Option<Status> {
                Some(Status::Ready)
            }
        }
        let lines = vec!["????".to_string()];
        let c = classify(&lines, "", false, modes(false), None, Some(&FixedSampler));
        assert_eq!(c.status, Status::Ready);
    }

    #[test]
    fn unknown_without_sampler() {
        let lines = vec!["????".to_string()];
        let c = classify(&lines, "", false, modes(false), None, None);
        assert_eq!(c.status, Status::Unknown);
    }
}
