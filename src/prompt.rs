use std::io;

use dialoguer::{Input, theme::ColorfulTheme};

const INVALID_ANSWER: &str = "Invalid response. Please enter \"y\" or \"n\".";

/// Asks a yes/no question on the terminal until the answer is `y` or `n`.
pub fn confirm_on_console(prompt: &str) -> io::Result<bool> {
    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("{prompt} [y/n]"))
        .validate_with(|input: &String| -> Result<(), &'static str> {
            parse_answer(input).map(|_| ()).ok_or(INVALID_ANSWER)
        })
        .interact_text()?;

    parse_answer(&answer)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, INVALID_ANSWER))
}

/// `y`/`n` in either case; anything else is unrecognized.
pub fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" => Some(true),
        "n" => Some(false),
        _ => None,
    }
}
