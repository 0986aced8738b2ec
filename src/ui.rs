use colored::Colorize;
use inquire::{Password, PasswordDisplayMode, Select, Text};

/// Interactive questions asked while resolving a backend.
///
/// Every method returns `None` when the user cancels (Esc/Ctrl-C).
pub trait Prompter {
    fn select(&self, message: &str, options: &[String]) -> Option<String>;
    fn input(&self, message: &str, placeholder: Option<&str>) -> Option<String>;
    fn secret(&self, message: &str) -> Option<String>;
}

/// Terminal prompts backed by `inquire`
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn select(&self, message: &str, options: &[String]) -> Option<String> {
        if options.is_empty() {
            return None;
        }
        Select::new(message, options.to_vec()).prompt().ok()
    }

    fn input(&self, message: &str, placeholder: Option<&str>) -> Option<String> {
        let mut text = Text::new(message);
        if let Some(placeholder) = placeholder {
            text = text.with_placeholder(placeholder);
        }
        text.prompt().ok()
    }

    fn secret(&self, message: &str) -> Option<String> {
        Password::new(message)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
            .ok()
    }
}

/// Prompter for non-interactive runs: every question is cancelled
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn select(&self, _message: &str, _options: &[String]) -> Option<String> {
        None
    }

    fn input(&self, _message: &str, _placeholder: Option<&str>) -> Option<String> {
        None
    }

    fn secret(&self, _message: &str) -> Option<String> {
        None
    }
}

/// Where user-facing notices go
pub trait Notifier {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Colored notices on stderr
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn info(&self, message: &str) {
        eprintln!("{} {}", "info:".cyan().bold(), message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
}
