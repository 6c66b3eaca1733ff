//! Scripted intake conversation.
//!
//! The flow never sleeps itself. Every transition that needs a delay hands back
//! a [`Scheduled`] step; the session driver waits and feeds it to
//! [`IntakeFlow::apply`]. Steps that arrive for a phase the flow has already
//! left are dropped, so a late timer can never replay a transition.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, Transcript};
use crate::error::ConciergeError;

pub const CLOSING_MESSAGE: &str = "Perfect. I've curated a list of exclusive properties that match your criteria. Analyzing market data now...";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "question", rename_all = "snake_case")]
pub enum IntakePhase {
    Idle,
    Asking(usize),
    AwaitingAnswer(usize),
    /// Answer recorded, waiting to ask the question at this index.
    Transitioning(usize),
    Finishing,
    Completing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeStep {
    Begin,
    Reveal(usize),
    Advance(usize),
    Close,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub delay: Duration,
    pub step: IntakeStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeTimings {
    pub start: Duration,
    pub typing: Duration,
    pub answer_gap: Duration,
    pub closing: Duration,
    pub completion: Duration,
}

impl Default for IntakeTimings {
    fn default() -> Self {
        Self {
            start: Duration::from_millis(1000),
            typing: Duration::from_millis(1500),
            answer_gap: Duration::from_millis(800),
            closing: Duration::from_millis(2000),
            completion: Duration::from_millis(3000),
        }
    }
}

/// What a step changed, for the driver to publish.
#[derive(Debug, Default)]
pub struct Applied {
    pub message: Option<ChatMessage>,
    pub typing: Option<bool>,
    pub next: Option<Scheduled>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeAnswer {
    pub question_id: String,
    pub answer: String,
}

#[derive(Debug, Clone)]
pub struct IntakeFlow {
    questions: Vec<Question>,
    timings: IntakeTimings,
    phase: IntakePhase,
    started: bool,
    typing: bool,
    options_visible: bool,
    selection: Vec<String>,
    transcript: Transcript,
    answers: Vec<IntakeAnswer>,
}

impl IntakeFlow {
    pub fn new(questions: Vec<Question>, greeting: impl Into<String>, timings: IntakeTimings) -> Self {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::bot(greeting));
        Self {
            questions,
            timings,
            phase: IntakePhase::Idle,
            started: false,
            typing: false,
            options_visible: false,
            selection: Vec::new(),
            transcript,
            answers: Vec::new(),
        }
    }

    /// Kicks off the first question. Only the first call has any effect.
    pub fn start(&mut self) -> Option<Scheduled> {
        if self.started {
            return None;
        }
        self.started = true;
        Some(Scheduled {
            delay: self.timings.start,
            step: IntakeStep::Begin,
        })
    }

    pub fn apply(&mut self, step: IntakeStep) -> Applied {
        match (step, self.phase) {
            (IntakeStep::Begin, IntakePhase::Idle) if self.started => self.enter_question(0),
            (IntakeStep::Reveal(i), IntakePhase::Asking(current)) if i == current => {
                self.typing = false;
                self.options_visible = true;
                self.selection.clear();
                self.phase = IntakePhase::AwaitingAnswer(i);
                let message = self.transcript.push(ChatMessage::bot(&self.questions[i].text)).clone();
                Applied {
                    message: Some(message),
                    typing: Some(false),
                    ..Applied::default()
                }
            }
            (IntakeStep::Advance(i), IntakePhase::Transitioning(next)) if i == next => {
                self.enter_question(i)
            }
            (IntakeStep::Close, IntakePhase::Finishing) => {
                self.typing = false;
                self.phase = IntakePhase::Completing;
                let message = self.transcript.push(ChatMessage::bot(CLOSING_MESSAGE)).clone();
                Applied {
                    message: Some(message),
                    typing: Some(false),
                    next: Some(Scheduled {
                        delay: self.timings.completion,
                        step: IntakeStep::Complete,
                    }),
                    ..Applied::default()
                }
            }
            (IntakeStep::Complete, IntakePhase::Completing) => {
                self.phase = IntakePhase::Done;
                Applied {
                    completed: true,
                    ..Applied::default()
                }
            }
            _ => {
                tracing::debug!("Dropping stale intake step {:?} in phase {:?}", step, self.phase);
                Applied::default()
            }
        }
    }

    fn enter_question(&mut self, index: usize) -> Applied {
        self.typing = true;
        let next = if index >= self.questions.len() {
            self.phase = IntakePhase::Finishing;
            Scheduled {
                delay: self.timings.closing,
                step: IntakeStep::Close,
            }
        } else {
            self.phase = IntakePhase::Asking(index);
            Scheduled {
                delay: self.timings.typing,
                step: IntakeStep::Reveal(index),
            }
        };
        Applied {
            typing: Some(true),
            next: Some(next),
            ..Applied::default()
        }
    }

    /// Adds or removes an option from the pending answer.
    pub fn toggle_option(&mut self, option: &str) -> Result<&[String], ConciergeError> {
        let question = self.awaiting_question().ok_or(ConciergeError::IntakeNotAwaitingAnswer)?;
        if !question.options.iter().any(|o| o == option) {
            return Err(ConciergeError::UnknownOption(option.to_string()));
        }

        if let Some(pos) = self.selection.iter().position(|o| o == option) {
            self.selection.remove(pos);
        } else {
            self.selection.push(option.to_string());
        }
        Ok(&self.selection)
    }

    /// Sends the answer: typed text when given, otherwise the selected options
    /// joined with `", "`.
    pub fn submit(&mut self, text: Option<&str>) -> Result<(ChatMessage, Scheduled), ConciergeError> {
        let index = match self.phase {
            IntakePhase::AwaitingAnswer(i) => i,
            _ => return Err(ConciergeError::IntakeNotAwaitingAnswer),
        };

        let answer = match text {
            Some(typed) => typed.to_string(),
            None => self.selection.join(", "),
        };
        if answer.trim().is_empty() {
            return Err(ConciergeError::EmptyAnswer);
        }

        self.options_visible = false;
        self.selection.clear();
        self.answers.push(IntakeAnswer {
            question_id: self.questions[index].id.clone(),
            answer: answer.clone(),
        });
        self.phase = IntakePhase::Transitioning(index + 1);
        let message = self.transcript.push(ChatMessage::user(answer)).clone();

        Ok((
            message,
            Scheduled {
                delay: self.timings.answer_gap,
                step: IntakeStep::Advance(index + 1),
            },
        ))
    }

    fn awaiting_question(&self) -> Option<&Question> {
        match self.phase {
            IntakePhase::AwaitingAnswer(i) if self.options_visible => self.questions.get(i),
            _ => None,
        }
    }

    pub fn phase(&self) -> IntakePhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == IntakePhase::Done
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn answers(&self) -> &[IntakeAnswer] {
        &self.answers
    }

    pub fn view(&self) -> IntakeView {
        let options = self.awaiting_question().map(|q| {
            q.options
                .iter()
                .map(|label| OptionView {
                    label: label.clone(),
                    selected: self.selection.contains(label),
                })
                .collect()
        });

        IntakeView {
            phase: self.phase,
            typing: self.typing,
            transcript: self.transcript.clone(),
            options,
            input: self.selection.join(", "),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeView {
    pub phase: IntakePhase,
    pub typing: bool,
    pub transcript: Transcript,
    pub options: Option<Vec<OptionView>>,
    pub input: String,
}
