//! Line-oriented chat console, independent of where lines come from.

use std::io::{BufRead, Write};

use llm::{
    ABORT_MESSAGE, CancelFlag, ConsoleInput, EMPTY_INPUT_MESSAGE, Generation, LlmError,
    OutputMode, PROMPT_LABEL,
};
use tracing::debug;

/// Counters for one console session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleSummary {
    pub completed: usize,
    pub interrupted: usize,
    pub rejected: usize,
}

/// Reads prompts from `input` until `quit()` or end of input.
///
/// `generate` receives the user text, the cancel flag and a sink for streamed
/// deltas. The flag is re-armed and marked in flight for the duration of
/// each call, so an outside handler only interrupts a running reply. An interrupted
/// generation prints its partial text followed by [`ABORT_MESSAGE`] and the
/// console carries on; any other generation error ends the session.
pub fn run_console<R, W, G>(
    input: &mut R,
    output: &mut W,
    mode: OutputMode,
    cancel: &CancelFlag,
    mut generate: G,
) -> Result<ConsoleSummary, LlmError>
where
    R: BufRead,
    W: Write,
    G: FnMut(&str, &CancelFlag, &mut dyn FnMut(&str)) -> Result<Generation, LlmError>,
{
    let mut summary = ConsoleSummary::default();
    let mut line = String::new();

    loop {
        write!(output, "{PROMPT_LABEL}")?;
        output.flush()?;

        line.clear();
        let read = input.read_line(&mut line)?;
        let request = ConsoleInput::parse((read > 0).then_some(line.as_str()));

        let text = match request {
            ConsoleInput::Quit => break,
            ConsoleInput::Empty => {
                writeln!(output, "{EMPTY_INPUT_MESSAGE}")?;
                summary.rejected += 1;
                continue;
            }
            ConsoleInput::Prompt(text) => text,
        };

        cancel.begin();
        write!(output, "\nOutput: ")?;
        output.flush()?;

        // Streaming deltas go straight out; write errors are surfaced after the
        // generation returns.
        let mut sink_error = None;
        let result = {
            let mut sink = |delta: &str| {
                if sink_error.is_some() {
                    return;
                }
                if let Err(err) = output.write_all(delta.as_bytes()).and_then(|_| output.flush())
                {
                    sink_error = Some(err);
                }
            };
            let result = generate(&text, cancel, &mut sink);
            cancel.finish();
            result
        };
        if let Some(err) = sink_error {
            return Err(err.into());
        }

        match result {
            Ok(generation) => {
                if mode == OutputMode::Buffered {
                    write!(output, "{}", generation.text)?;
                }
                summary.completed += 1;
            }
            Err(LlmError::GenerationInterrupted {
                partial_text,
                generated_tokens,
            }) => {
                if mode == OutputMode::Buffered {
                    write!(output, "{partial_text}")?;
                }
                writeln!(output)?;
                write!(output, "{ABORT_MESSAGE}")?;
                debug!(generated = generated_tokens, "console_generation_aborted");
                summary.interrupted += 1;
            }
            Err(err) => return Err(err),
        }
        writeln!(output)?;
        writeln!(output)?;
    }

    Ok(summary)
}
