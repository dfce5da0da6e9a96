//! Chat-turn template and console line handling.

/// Shown before every read from the console.
pub const PROMPT_LABEL: &str = "Prompt (Use quit() to exit): ";

/// Printed when the user submits an empty line.
pub const EMPTY_INPUT_MESSAGE: &str = "Error, input cannot be empty";

/// Printed when Ctrl+C interrupts a generation.
pub const ABORT_MESSAGE: &str = "  --control+c pressed, aborting generation--";

/// Literal line that ends the session.
pub const QUIT_COMMAND: &str = "quit()";

/// Wraps one user message in the Qwen chat-turn markers and opens the assistant turn.
pub fn format_user_turn(text: &str) -> String {
    format!("<|im_start|>user\n{text}<|im_end|>\n<|im_start|>assistant\n")
}

/// What a console line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Quit,
    Empty,
    Prompt(String),
}

impl ConsoleInput {
    /// Classifies a raw line as read from stdin (trailing newline included or
    /// not). `None` is end of input and quits like `quit()`.
    pub fn parse(line: Option<&str>) -> Self {
        let Some(line) = line else {
            return ConsoleInput::Quit;
        };
        let text = line.trim_end_matches(['\n', '\r']);
        if text.is_empty() {
            ConsoleInput::Empty
        } else if text == QUIT_COMMAND {
            ConsoleInput::Quit
        } else {
            ConsoleInput::Prompt(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_wraps_user_turn() {
        assert_eq!(
            format_user_turn("What is 2+2?"),
            "<|im_start|>user\nWhat is 2+2?<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn quit_is_exact() {
        assert_eq!(ConsoleInput::parse(Some("quit()\n")), ConsoleInput::Quit);
        assert_eq!(
            ConsoleInput::parse(Some("quit() ")),
            ConsoleInput::Prompt("quit() ".into())
        );
        assert_eq!(
            ConsoleInput::parse(Some("QUIT()")),
            ConsoleInput::Prompt("QUIT()".into())
        );
    }

    #[test]
    fn empty_line_is_flagged() {
        assert_eq!(ConsoleInput::parse(Some("")), ConsoleInput::Empty);
        assert_eq!(ConsoleInput::parse(Some("\r\n")), ConsoleInput::Empty);
    }

    #[test]
    fn end_of_input_quits() {
        assert_eq!(ConsoleInput::parse(None), ConsoleInput::Quit);
    }

    #[test]
    fn whitespace_only_line_is_a_prompt() {
        assert_eq!(
            ConsoleInput::parse(Some("  \n")),
            ConsoleInput::Prompt("  ".into())
        );
    }
}
