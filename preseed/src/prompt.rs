//! Terminal-backed prompter

use dialoguer::{Confirm, Input, Password};
use preseed_core::abstractions::{Prompter, Validator};
use preseed_core::error::{PreseedError, PreseedResult};

fn prompt_error(err: dialoguer::Error) -> PreseedError {
    PreseedError::Prompt {
        message: err.to_string(),
    }
}

/// Question text without the trailing separator dialoguer adds itself
fn label(question: &str) -> &str {
    question.trim_end().trim_end_matches(':').trim_end()
}

/// Interactive prompter on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn ask_bool(&mut self, question: &str, default: bool) -> PreseedResult<bool> {
        Confirm::new()
            .with_prompt(label(question))
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn ask_string(
        &mut self,
        question: &str,
        default: &str,
        validator: Option<Validator<'_>>,
    ) -> PreseedResult<String> {
        let mut input = Input::<String>::new()
            .with_prompt(label(question))
            .show_default(false);

        if !default.is_empty() {
            input = input.default(default.to_string());
        }

        match validator {
            Some(validate) => input
                .allow_empty(true)
                .validate_with(move |value: &String| validate(value))
                .interact_text()
                .map_err(prompt_error),
            None => input.interact_text().map_err(prompt_error),
        }
    }

    fn ask_password(&mut self, question: &str) -> PreseedResult<String> {
        Password::new()
            .with_prompt(label(question))
            .interact()
            .map_err(prompt_error)
    }

    fn ask_choice(
        &mut self,
        question: &str,
        choices: &[String],
        default: &str,
    ) -> PreseedResult<String> {
        Input::<String>::new()
            .with_prompt(label(question))
            .show_default(false)
            .default(default.to_string())
            .validate_with(|value: &String| -> Result<(), String> {
                if choices.contains(value) {
                    Ok(())
                } else {
                    Err("Invalid input, try again.".to_string())
                }
            })
            .interact_text()
            .map_err(prompt_error)
    }

    fn ask_int(
        &mut self,
        question: &str,
        min: i64,
        max: Option<i64>,
        default: i64,
    ) -> PreseedResult<i64> {
        Input::<i64>::new()
            .with_prompt(label(question))
            .show_default(false)
            .default(default)
            .validate_with(|value: &i64| -> Result<(), String> {
                if *value < min {
                    return Err(format!("Minimum value is {}", min));
                }
                match max {
                    Some(max) if *value > max => Err(format!("Maximum value is {}", max)),
                    _ => Ok(()),
                }
            })
            .interact_text()
            .map_err(prompt_error)
    }

    fn say(&mut self, message: &str) {
        println!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_strips_trailing_separator() {
        assert_eq!(label("Cluster trust password: "), "Cluster trust password");
        assert_eq!(
            label("What should the new bridge be called [default=lxdbr0]? "),
            "What should the new bridge be called [default=lxdbr0]?"
        );
        assert_eq!(label("ok? (yes/no) [default=no]: "), "ok? (yes/no) [default=no]");
    }
}
