//! Operator decisions the run depends on, behind a trait so the core can be
//! driven without a terminal.

use crate::shutdown::Shutdown;
use crate::tui::{self, ModelChoice};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, queue, style::Print, terminal};
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// How the continue-watching question was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAnswer {
    Yes,
    No,
    TimedOut,
    EndOfInput,
    Interrupted,
}

impl WatchAnswer {
    pub fn wants_watch(self) -> bool {
        self == WatchAnswer::Yes
    }
}

pub trait DecisionProvider {
    /// Ask which model to use. `Ok(None)` means the operator declined.
    fn choose_model(&mut self, models: &[String]) -> Result<Option<ModelChoice>>;

    /// Ask whether to keep watching after the backlog, defaulting to no.
    fn confirm_watch(&mut self, timeout: Duration, shutdown: &Shutdown) -> WatchAnswer;
}

pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Asks on the real terminal: a ratatui picker and a raw-mode countdown when
/// stdin is a tty, plain line prompts on stderr otherwise.
#[derive(Debug, Default)]
pub struct TerminalDecisions;

impl DecisionProvider for TerminalDecisions {
    fn choose_model(&mut self, models: &[String]) -> Result<Option<ModelChoice>> {
        if io::stdin().is_terminal() && io::stderr().is_terminal() {
            tui::pick_model(models)
        } else {
            let stdin = io::stdin();
            Ok(choose_model_lines(&mut stdin.lock(), &mut io::stderr(), models)?)
        }
    }

    fn confirm_watch(&mut self, timeout: Duration, shutdown: &Shutdown) -> WatchAnswer {
        let answer = if io::stdin().is_terminal() {
            confirm_watch_keys(timeout, shutdown)
        } else {
            confirm_watch_lines(timeout, shutdown)
        };
        match answer {
            WatchAnswer::TimedOut => {
                tracing::info!("No response received, defaulting to 'no'")
            }
            WatchAnswer::EndOfInput | WatchAnswer::Interrupted => {
                tracing::info!("Prompt aborted, defaulting to 'no'")
            }
            WatchAnswer::Yes | WatchAnswer::No => {}
        }
        answer
    }
}

/// Numbered list on `out`, answers read from `input`. `q` or end of input
/// cancels; anything unparseable asks again.
pub fn choose_model_lines<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    models: &[String],
) -> io::Result<Option<ModelChoice>> {
    if models.is_empty() {
        return Ok(None);
    }
    writeln!(out, "Available Ollama models:")?;
    for (i, model) in models.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, model)?;
    }

    loop {
        write!(out, "\nSelect a model (1-{}) or 'q' to quit: ", models.len())?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        let idx = match line.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                writeln!(out, "Please enter a valid number")?;
                continue;
            }
        };
        let Some(model) = idx.checked_sub(1).and_then(|i| models.get(i)) else {
            writeln!(out, "Please enter a number between 1 and {}", models.len())?;
            continue;
        };

        write!(out, "Set '{model}' as default for future runs? (y/n): ")?;
        out.flush()?;
        let save_as_default = read_line(input)?.is_some_and(|a| is_affirmative(&a));
        return Ok(Some(ModelChoice {
            model: model.clone(),
            save_as_default,
        }));
    }
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut buf = String::new();
    match input.read_line(&mut buf)? {
        0 => Ok(None),
        _ => Ok(Some(buf)),
    }
}

fn countdown_text(remaining: Duration) -> String {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    format!("Start monitoring for new reports? (y/n) [default: n, timeout: {secs}s]: ")
}

/// Time until the displayed whole-second count next changes, capped by the
/// remaining time.
fn until_next_tick(remaining: Duration) -> Duration {
    let frac = Duration::from_nanos(u64::from(remaining.subsec_nanos()));
    if frac.is_zero() {
        remaining.min(Duration::from_secs(1))
    } else {
        frac
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn redraw_prompt(err: &mut io::Stderr, remaining: Duration, typed: &str) -> io::Result<()> {
    queue!(
        err,
        cursor::MoveToColumn(0),
        terminal::Clear(terminal::ClearType::CurrentLine),
        Print(countdown_text(remaining)),
        Print(typed)
    )?;
    err.flush()
}

/// Raw-mode variant: each wait is one `event::poll` that returns on the
/// first key press or at the next countdown tick, whichever comes first.
fn confirm_watch_keys(timeout: Duration, shutdown: &Shutdown) -> WatchAnswer {
    let _raw = match RawModeGuard::enable() {
        Ok(guard) => guard,
        Err(err) => {
            tracing::debug!(error = %err, "raw mode unavailable, falling back to line input");
            return confirm_watch_lines(timeout, shutdown);
        }
    };
    let mut err = io::stderr();
    let deadline = Instant::now() + timeout;
    let mut typed = String::new();

    let answer = loop {
        if shutdown.is_triggered() {
            break WatchAnswer::Interrupted;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break WatchAnswer::TimedOut;
        }
        if redraw_prompt(&mut err, remaining, &typed).is_err() {
            break WatchAnswer::EndOfInput;
        }

        match event::poll(until_next_tick(remaining)) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(_) => break WatchAnswer::EndOfInput,
        }
        let key = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
            Ok(_) => continue,
            Err(_) => break WatchAnswer::EndOfInput,
        };
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => break WatchAnswer::Interrupted,
            KeyCode::Char('d') if ctrl && typed.is_empty() => break WatchAnswer::EndOfInput,
            KeyCode::Esc => break WatchAnswer::Interrupted,
            KeyCode::Enter => {
                break if is_affirmative(&typed) {
                    WatchAnswer::Yes
                } else {
                    WatchAnswer::No
                };
            }
            KeyCode::Backspace => {
                typed.pop();
            }
            KeyCode::Char(c) if !ctrl => typed.push(c),
            _ => {}
        }
    };

    let echo = if answer == WatchAnswer::TimedOut { "n" } else { "" };
    let _ = write!(err, "{echo}\r\n");
    let _ = err.flush();
    answer
}

/// Line variant for piped stdin: a reader thread hands the line over a
/// channel and the prompt waits on it against the deadline.
fn confirm_watch_lines(timeout: Duration, shutdown: &Shutdown) -> WatchAnswer {
    let (tx, rx) = mpsc::channel::<Option<String>>();
    // The reader may outlive the prompt if nobody answers; it just blocks on
    // stdin until the process exits.
    let _ = thread::Builder::new()
        .name("dmarcwatch-prompt".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let line = read_line(&mut stdin.lock()).ok().flatten();
            let _ = tx.send(line);
        });

    await_line_answer(&rx, timeout, shutdown, &mut io::stderr())
}

/// Race the next line from `answers` (`None` meaning end of input) against
/// the deadline, redrawing the countdown on `out` each tick. Anything that
/// arrives after the deadline is never read.
fn await_line_answer<W: Write>(
    answers: &Receiver<Option<String>>,
    timeout: Duration,
    shutdown: &Shutdown,
    out: &mut W,
) -> WatchAnswer {
    let deadline = Instant::now() + timeout;
    let answer = loop {
        if shutdown.is_triggered() {
            break WatchAnswer::Interrupted;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break WatchAnswer::TimedOut;
        }
        let _ = write!(out, "\r{}", countdown_text(remaining));
        let _ = out.flush();

        match answers.recv_timeout(until_next_tick(remaining)) {
            Ok(Some(line)) if is_affirmative(&line) => break WatchAnswer::Yes,
            Ok(Some(_)) => break WatchAnswer::No,
            Ok(None) | Err(RecvTimeoutError::Disconnected) => break WatchAnswer::EndOfInput,
            Err(RecvTimeoutError::Timeout) => {}
        }
    };

    let echo = if answer == WatchAnswer::TimedOut { "n" } else { "" };
    let _ = writeln!(out, "{echo}");
    answer
}

/// Pre-recorded answers, for driving a run without a terminal.
#[derive(Debug, Clone)]
pub struct ScriptedDecisions {
    pub model_choice: Option<ModelChoice>,
    pub watch_answer: WatchAnswer,
    pub model_prompts: usize,
    pub watch_prompts: usize,
}

impl ScriptedDecisions {
    pub fn new(model_choice: Option<ModelChoice>, watch_answer: WatchAnswer) -> Self {
        Self {
            model_choice,
            watch_answer,
            model_prompts: 0,
            watch_prompts: 0,
        }
    }
}

impl DecisionProvider for ScriptedDecisions {
    fn choose_model(&mut self, _models: &[String]) -> Result<Option<ModelChoice>> {
        self.model_prompts += 1;
        Ok(self.model_choice.clone())
    }

    fn confirm_watch(&mut self, _timeout: Duration, _shutdown: &Shutdown) -> WatchAnswer {
        self.watch_prompts += 1;
        self.watch_answer
    }
}
