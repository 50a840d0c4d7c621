use std::sync::{mpsc, Mutex};
use std::time::Duration;

use super::{CompletionChoice, PromptSurface};

const ANSWER_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Prompts on stdout and takes answers from lines the console driver routes in.
///
/// The driver owns stdin; whenever a question is open, the next line it reads
/// goes to [`ConsolePrompt::offer`] instead of being treated as a command.
pub struct ConsolePrompt {
    pending: Mutex<Option<mpsc::Sender<String>>>,
    timeout: Duration,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self::with_timeout(ANSWER_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(None),
            timeout,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.lock().is_some()
    }

    /// Hands `line` to the open question. Gives the line back if nobody asked.
    pub fn offer(&self, line: String) -> Option<String> {
        match self.lock().take() {
            Some(answer) => match answer.send(line) {
                Ok(()) => None,
                Err(mpsc::SendError(line)) => Some(line),
            },
            None => Some(line),
        }
    }

    fn ask(&self, question: &str) -> Option<String> {
        let (tx, rx) = mpsc::channel();
        *self.lock() = Some(tx);
        println!("{question}");
        let answer = rx.recv_timeout(self.timeout).ok();
        self.lock().take();
        answer
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<String>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptSurface for ConsolePrompt {
    fn ask_starter_task(&self, prompt: &str) -> Option<String> {
        self.ask(&format!("Ready to focus? {prompt}"))
            .map(|answer| answer.trim().to_string())
            .filter(|answer| !answer.is_empty())
    }

    fn notify_completion(&self) -> CompletionChoice {
        let answer = self.ask("Focus session complete! [b] start a break, [c] close");
        match answer.as_deref().map(str::trim) {
            Some(choice) if choice.eq_ignore_ascii_case("b") => CompletionChoice::StartBreak,
            _ => CompletionChoice::Close,
        }
    }
}
