//! Helper capabilities exposed to templates and the CLI.
//!
//! Markup-aware logging colors inline `*`/`#`/`@`-prefixed tokens, and
//! the interactive prompt re-asks until an optional validator accepts
//! the answer. The scripted-block harness ships its own in-interpreter
//! shims with the same markup conventions.

use codeprompt_core::{AppError, AppResult};
use regex::Regex;
use std::io::{BufRead, Write};
use std::sync::OnceLock;

const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A sigil only counts at a token boundary
    RE.get_or_init(|| Regex::new(r"(^|\s)([*#@])(\S+)").unwrap())
}

/// Expand inline markup to ANSI color codes.
///
/// `*token` renders yellow, `#token` cyan, `@token` green; the sigil is
/// dropped either way. With `color` disabled only the sigils are removed.
pub fn colorize_markup(text: &str, color: bool) -> String {
    markup_regex()
        .replace_all(text, |caps: &regex::Captures| {
            let lead = &caps[1];
            let token = &caps[3];
            if !color {
                return format!("{}{}", lead, token);
            }
            let code = match &caps[2] {
                "*" => YELLOW,
                "#" => CYAN,
                _ => GREEN,
            };
            format!("{}{}{}{}", lead, code, token, RESET)
        })
        .into_owned()
}

/// Print a markup-aware progress message to stderr.
pub fn log_markup(text: &str, color: bool) {
    eprintln!("{}", colorize_markup(text, color));
}

/// Ask a question on `writer` and read the answer from `reader`,
/// re-asking until `validator` (when given) accepts it.
pub fn prompt_from_reader<R: BufRead, W: Write>(
    question: &str,
    reader: &mut R,
    writer: &mut W,
    validator: Option<&dyn Fn(&str) -> bool>,
) -> AppResult<String> {
    loop {
        write!(writer, "{} ", question)?;
        writer.flush()?;

        let mut line = String::new();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            return Err(AppError::Other(
                "Input stream closed while waiting for an answer".to_string(),
            ));
        }

        let answer = line.trim_end_matches(['\n', '\r']).to_string();
        match validator {
            Some(validate) if !validate(&answer) => {
                writeln!(writer, "Invalid answer, try again.")?;
            }
            _ => return Ok(answer),
        }
    }
}

/// Interactive prompt on the terminal (stdin/stderr).
pub fn prompt_user(
    question: &str,
    validator: Option<&dyn Fn(&str) -> bool>,
) -> AppResult<String> {
    let stdin = std::io::stdin();
    let mut reader = stdin.lock();
    let mut writer = std::io::stderr();
    prompt_from_reader(question, &mut reader, &mut writer, validator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_colorize_tokens() {
        let out = colorize_markup("building *fast with #care for @you", true);
        assert_eq!(
            out,
            "building \x1b[33mfast\x1b[0m with \x1b[36mcare\x1b[0m for \x1b[32myou\x1b[0m"
        );
    }

    #[test]
    fn test_colorize_disabled_strips_sigils() {
        let out = colorize_markup("*warn and #note", false);
        assert_eq!(out, "warn and note");
    }

    #[test]
    fn test_sigil_inside_word_is_untouched() {
        let out = colorize_markup("user@host stays", true);
        assert_eq!(out, "user@host stays");
    }

    #[test]
    fn test_prompt_accepts_first_answer_without_validator() {
        let mut input = Cursor::new(b"blue\n".to_vec());
        let mut output = Vec::new();
        let answer =
            prompt_from_reader("Favorite color?", &mut input, &mut output, None).unwrap();
        assert_eq!(answer, "blue");
        assert!(String::from_utf8(output).unwrap().contains("Favorite color?"));
    }

    #[test]
    fn test_prompt_reasks_until_valid() {
        let mut input = Cursor::new(b"maybe\nyes\n".to_vec());
        let mut output = Vec::new();
        let validate = |answer: &str| answer == "yes" || answer == "no";
        let answer = prompt_from_reader(
            "Proceed? (yes/no)",
            &mut input,
            &mut output,
            Some(&validate),
        )
        .unwrap();
        assert_eq!(answer, "yes");
        assert!(String::from_utf8(output).unwrap().contains("Invalid answer"));
    }

    #[test]
    fn test_prompt_eof_is_an_error() {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let result = prompt_from_reader("Anything?", &mut input, &mut output, None);
        assert!(result.is_err());
    }
}
