use thiserror::Error;

use super::Question;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    #[default]
    NotStarted,
    InProgress,
    Finished,
}

#[derive(Debug, Error, PartialEq)]
pub enum QuizError {
    #[error("{operation} is not valid while the quiz is {phase:?}")]
    InvalidTransition {
        operation: &'static str,
        phase: Phase,
    },

    #[error("cannot start a quiz with an empty question batch")]
    EmptyBatch,

    #[error("option index {index} is out of range for a question with {options} options")]
    OptionOutOfRange { index: usize, options: usize },
}

/// The quiz session state machine. Phases move NotStarted → InProgress →
/// Finished; the only way back is `start`, which resets everything.
///
/// Callers own the sequencing: calling an operation in the wrong phase is a
/// bug on their side and comes back as `QuizError::InvalidTransition`.
/// Out-of-range option indices likewise fail loudly, they are never clamped.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QuizMachine {
    questions: Vec<Question>,
    current: usize,
    answers: Vec<usize>,
    score: usize,
    phase: Phase,
}

/// Read-only view of the session for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot<'a> {
    pub phase: Phase,
    pub current_index: usize,
    pub answers: &'a [usize],
    pub score: usize,
    pub questions: &'a [Question],
}

impl QuizMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new session over `questions`. Valid from NotStarted or
    /// Finished; an in-progress quiz must run to completion first.
    pub fn start(&mut self, questions: Vec<Question>) -> Result<(), QuizError> {
        if self.phase == Phase::InProgress {
            return Err(QuizError::InvalidTransition {
                operation: "start",
                phase: self.phase,
            });
        }
        if questions.is_empty() {
            // The generator's fallback guarantee means this should never
            // happen, but an empty batch has no current question to show.
            return Err(QuizError::EmptyBatch);
        }

        self.questions = questions;
        self.current = 0;
        self.answers.clear();
        self.score = 0;
        self.phase = Phase::InProgress;
        Ok(())
    }

    /// Records the answer for the current question and advances, finishing
    /// the session on the last question. Answers are permanent.
    pub fn submit_answer(&mut self, option_index: usize) -> Result<(), QuizError> {
        if self.phase != Phase::InProgress {
            return Err(QuizError::InvalidTransition {
                operation: "submit_answer",
                phase: self.phase,
            });
        }

        let question = &self.questions[self.current];
        if option_index >= question.options.len() {
            return Err(QuizError::OptionOutOfRange {
                index: option_index,
                options: question.options.len(),
            });
        }

        self.answers.push(option_index);
        if option_index == question.correct_index {
            self.score += 1;
        }

        if self.current + 1 < self.questions.len() {
            self.current += 1;
        } else {
            self.phase = Phase::Finished;
        }
        Ok(())
    }

    pub fn current_question(&self) -> Result<&Question, QuizError> {
        if self.phase != Phase::InProgress {
            return Err(QuizError::InvalidTransition {
                operation: "current_question",
                phase: self.phase,
            });
        }
        Ok(&self.questions[self.current])
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            phase: self.phase,
            current_index: self.current,
            answers: &self.answers,
            score: self.score,
            questions: &self.questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct_index: usize, options: usize) -> Question {
        Question {
            id: format!("test-{correct_index}-{options}"),
            text: "¿Pregunta de prueba?".to_string(),
            options: (0..options).map(|i| format!("Opción {i}")).collect(),
            correct_index,
            explanation: "Porque sí.".to_string(),
            topic: None,
        }
    }

    #[test]
    fn start_resets_state_and_enters_in_progress() {
        let mut machine = QuizMachine::new();
        machine.start(vec![question(0, 3), question(1, 3)]).unwrap();
        machine.submit_answer(0).unwrap();
        machine.submit_answer(0).unwrap();
        assert_eq!(machine.snapshot().phase, Phase::Finished);

        machine.start(vec![question(2, 4)]).unwrap();
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.phase, Phase::InProgress);
        assert_eq!(snapshot.current_index, 0);
        assert_eq!(snapshot.score, 0);
        assert!(snapshot.answers.is_empty());
        assert_eq!(snapshot.questions.len(), 1);
    }

    #[test]
    fn start_rejects_empty_batch() {
        let mut machine = QuizMachine::new();
        assert_eq!(machine.start(vec![]), Err(QuizError::EmptyBatch));
        assert_eq!(machine.snapshot().phase, Phase::NotStarted);
    }

    #[test]
    fn start_rejects_in_progress_session() {
        let mut machine = QuizMachine::new();
        machine.start(vec![question(0, 3), question(0, 3)]).unwrap();
        assert_eq!(
            machine.start(vec![question(0, 3)]),
            Err(QuizError::InvalidTransition {
                operation: "start",
                phase: Phase::InProgress,
            })
        );
        assert_eq!(machine.snapshot().questions.len(), 2);
    }

    #[test]
    fn answering_every_question_finishes_with_correct_score() {
        let mut machine = QuizMachine::new();
        machine
            .start(vec![question(0, 3), question(2, 3), question(1, 4)])
            .unwrap();

        machine.submit_answer(0).unwrap(); // correct
        machine.submit_answer(1).unwrap(); // wrong
        machine.submit_answer(1).unwrap(); // correct

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.phase, Phase::Finished);
        assert_eq!(snapshot.score, 2);
        assert_eq!(snapshot.answers, &[0, 1, 1]);
    }

    #[test]
    fn single_question_batch_finishes_after_one_answer() {
        let mut machine = QuizMachine::new();
        machine.start(vec![question(1, 3)]).unwrap();
        machine.submit_answer(1).unwrap();
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.phase, Phase::Finished);
        assert_eq!(snapshot.score, 1);
    }

    #[test]
    fn answers_track_the_pointer_while_in_progress() {
        let mut machine = QuizMachine::new();
        machine
            .start(vec![question(0, 3), question(0, 3), question(0, 3)])
            .unwrap();
        assert_eq!(machine.snapshot().answers.len(), machine.snapshot().current_index);
        machine.submit_answer(2).unwrap();
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.answers.len(), snapshot.current_index);
    }

    #[test]
    fn snapshot_is_stable_between_mutations() {
        let mut machine = QuizMachine::new();
        machine.start(vec![question(0, 3), question(0, 3)]).unwrap();
        machine.submit_answer(1).unwrap();
        assert_eq!(machine.snapshot(), machine.snapshot());
    }

    #[test]
    fn submit_answer_requires_in_progress() {
        let mut machine = QuizMachine::new();
        assert_eq!(
            machine.submit_answer(0),
            Err(QuizError::InvalidTransition {
                operation: "submit_answer",
                phase: Phase::NotStarted,
            })
        );

        machine.start(vec![question(0, 3)]).unwrap();
        machine.submit_answer(0).unwrap();
        let before = machine.snapshot().score;
        assert_eq!(
            machine.submit_answer(0),
            Err(QuizError::InvalidTransition {
                operation: "submit_answer",
                phase: Phase::Finished,
            })
        );
        assert_eq!(machine.snapshot().score, before);
        assert_eq!(machine.snapshot().answers.len(), 1);
    }

    #[test]
    fn out_of_range_option_fails_without_mutating() {
        let mut machine = QuizMachine::new();
        machine.start(vec![question(0, 3)]).unwrap();
        assert_eq!(
            machine.submit_answer(3),
            Err(QuizError::OptionOutOfRange { index: 3, options: 3 })
        );
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.phase, Phase::InProgress);
        assert!(snapshot.answers.is_empty());
    }

    #[test]
    fn current_question_only_while_in_progress() {
        let mut machine = QuizMachine::new();
        assert!(machine.current_question().is_err());
        machine.start(vec![question(2, 4)]).unwrap();
        assert_eq!(machine.current_question().unwrap().correct_index, 2);
        machine.submit_answer(0).unwrap();
        assert!(machine.current_question().is_err());
    }
}
