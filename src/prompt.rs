use std::io::{self, BufRead, Write};

/// Asks the user whether an optional update should be installed.
pub trait Prompt {
    fn confirm(&self, current: &str, latest: &str) -> bool;
}

/// Yes/no question on the terminal. Anything but an explicit yes declines.
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn confirm(&self, current: &str, latest: &str) -> bool {
        print!(
            "Premedia {} is available (installed: {}). Update now? [y/N] ",
            latest, current
        );
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => is_yes(&line),
            Err(e) => {
                log::warn!("Could not read answer: {}", e);
                false
            }
        }
    }
}

/// Accepts every optional update, for `update --yes`.
pub struct AutoConfirm;

impl Prompt for AutoConfirm {
    fn confirm(&self, _current: &str, latest: &str) -> bool {
        log::info!("Accepting optional update to {} without asking", latest);
        true
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
