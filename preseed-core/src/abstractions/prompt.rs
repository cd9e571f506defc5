//! Operator prompt abstraction
//!
//! Planners never talk to a terminal directly. They ask questions through
//! [`Prompter`], which the binary backs with an interactive terminal and the
//! tests back with [`ScriptedPrompter`].

use std::collections::VecDeque;

use crate::error::{PreseedError, PreseedResult};

/// Answer validator: `Err(description)` rejects the answer and re-asks
pub type Validator<'a> = &'a dyn Fn(&str) -> Result<(), String>;

/// Operator question/answer channel.
///
/// Implementations loop on invalid input themselves: a returned value has
/// already passed the validator (or the built-in checks for booleans,
/// choices and integers).
pub trait Prompter: Send {
    /// Yes/no question; an empty answer selects `default`
    fn ask_bool(&mut self, question: &str, default: bool) -> PreseedResult<bool>;

    /// Free-form answer. An empty answer selects `default`. Without a
    /// validator an empty result is rejected; with one, the validator decides.
    fn ask_string(
        &mut self,
        question: &str,
        default: &str,
        validator: Option<Validator<'_>>,
    ) -> PreseedResult<String>;

    /// Secret answer, not echoed
    fn ask_password(&mut self, question: &str) -> PreseedResult<String>;

    /// One of `choices`; an empty answer selects `default`
    fn ask_choice(&mut self, question: &str, choices: &[String], default: &str)
        -> PreseedResult<String>;

    /// Integer in `[min, max]` (`max` of `None` is unbounded)
    fn ask_int(&mut self, question: &str, min: i64, max: Option<i64>, default: i64)
        -> PreseedResult<i64>;

    /// Informational message for the operator
    fn say(&mut self, message: &str);
}

/// One entry of a scripted conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    Question(String),
    Answer(String),
    Rejected { answer: String, reason: String },
    Message(String),
}

/// Prompter replaying pre-recorded answers.
///
/// Answers are given exactly as an operator would type them (`"yes"`,
/// `""` for the default, `"10.0.0.0/24"`). Invalid answers are rejected the
/// same way a terminal would and the next scripted answer is used.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    transcript: Vec<PromptEvent>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    /// Queue more answers after the existing ones
    pub fn push<S: Into<String>>(&mut self, answer: S) {
        self.answers.push_back(answer.into());
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    pub fn transcript(&self) -> &[PromptEvent] {
        &self.transcript
    }

    pub fn questions(&self) -> Vec<&str> {
        self.transcript
            .iter()
            .filter_map(|event| match event {
                PromptEvent::Question(q) => Some(q.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.transcript
            .iter()
            .filter_map(|event| match event {
                PromptEvent::Message(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn rejections(&self) -> Vec<(&str, &str)> {
        self.transcript
            .iter()
            .filter_map(|event| match event {
                PromptEvent::Rejected { answer, reason } => Some((answer.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Whether any question containing `fragment` was asked
    pub fn asked(&self, fragment: &str) -> bool {
        self.questions().iter().any(|q| q.contains(fragment))
    }

    fn next_answer(&mut self, question: &str) -> PreseedResult<String> {
        self.transcript
            .push(PromptEvent::Question(question.to_string()));
        let answer = self.answers.pop_front().ok_or_else(|| PreseedError::Prompt {
            message: format!("no scripted answer left for: {}", question),
        })?;
        self.transcript.push(PromptEvent::Answer(answer.clone()));
        Ok(answer)
    }

    fn reject(&mut self, answer: String, reason: impl Into<String>) {
        self.transcript.push(PromptEvent::Rejected {
            answer,
            reason: reason.into(),
        });
    }
}

impl Prompter for ScriptedPrompter {
    fn ask_bool(&mut self, question: &str, default: bool) -> PreseedResult<bool> {
        loop {
            let answer = self.next_answer(question)?;
            match answer.trim().to_lowercase().as_str() {
                "" => return Ok(default),
                "yes" | "y" => return Ok(true),
                "no" | "n" => return Ok(false),
                _ => self.reject(answer, "Invalid input, try again."),
            }
        }
    }

    fn ask_string(
        &mut self,
        question: &str,
        default: &str,
        validator: Option<Validator<'_>>,
    ) -> PreseedResult<String> {
        loop {
            let mut answer = self.next_answer(question)?;
            if answer.is_empty() {
                answer = default.to_string();
            }

            match validator {
                Some(validate) => match validate(&answer) {
                    Ok(()) => return Ok(answer),
                    Err(reason) => self.reject(answer, reason),
                },
                None if answer.is_empty() => self.reject(answer, "Invalid input, try again."),
                None => return Ok(answer),
            }
        }
    }

    fn ask_password(&mut self, question: &str) -> PreseedResult<String> {
        self.next_answer(question)
    }

    fn ask_choice(
        &mut self,
        question: &str,
        choices: &[String],
        default: &str,
    ) -> PreseedResult<String> {
        loop {
            let mut answer = self.next_answer(question)?;
            if answer.is_empty() {
                answer = default.to_string();
            }

            if choices.iter().any(|choice| *choice == answer) {
                return Ok(answer);
            }
            self.reject(answer, "Invalid input, try again.");
        }
    }

    fn ask_int(
        &mut self,
        question: &str,
        min: i64,
        max: Option<i64>,
        default: i64,
    ) -> PreseedResult<i64> {
        loop {
            let answer = self.next_answer(question)?;
            let value = if answer.trim().is_empty() {
                Ok(default)
            } else {
                answer.trim().parse::<i64>()
            };

            match value {
                Ok(value) if value < min => {
                    self.reject(answer, format!("Minimum value is {}", min))
                }
                Ok(value) if max.map_or(false, |max| value > max) => {
                    self.reject(answer, format!("Maximum value is {}", max.unwrap_or(value)))
                }
                Ok(value) => return Ok(value),
                Err(_) => self.reject(answer, "Invalid input, try again."),
            }
        }
    }

    fn say(&mut self, message: &str) {
        self.transcript
            .push(PromptEvent::Message(message.to_string()));
    }
}
