use super::session::{Phase, QuizError, Snapshot};
use super::Question;

/// DGT rule: fewer than 3 wrong answers passes, regardless of exam length.
pub const PASS_ERROR_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct QuizResults<'a> {
    pub score: usize,
    pub total: usize,
    pub error_count: usize,
    pub passed: bool,
    pub missed: Vec<MissedQuestion<'a>>,
}

/// One wrongly answered question, in original exam order.
#[derive(Debug, Clone, PartialEq)]
pub struct MissedQuestion<'a> {
    pub index: usize,
    pub question: &'a Question,
    pub user_answer: usize,
}

/// Derives the final verdict from a finished session.
pub fn evaluate<'a>(snapshot: &Snapshot<'a>) -> Result<QuizResults<'a>, QuizError> {
    if snapshot.phase != Phase::Finished {
        return Err(QuizError::InvalidTransition {
            operation: "evaluate",
            phase: snapshot.phase,
        });
    }

    let total = snapshot.questions.len();
    let error_count = total - snapshot.score;

    let missed = snapshot
        .questions
        .iter()
        .zip(snapshot.answers)
        .enumerate()
        .filter(|(_, (question, answer))| **answer != question.correct_index)
        .map(|(index, (question, answer))| MissedQuestion {
            index,
            question,
            user_answer: *answer,
        })
        .collect();

    Ok(QuizResults {
        score: snapshot.score,
        total,
        error_count,
        passed: error_count < PASS_ERROR_LIMIT,
        missed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::session::QuizMachine;

    fn question(correct_index: usize) -> Question {
        Question {
            id: format!("test-{correct_index}"),
            text: "¿Pregunta de prueba?".to_string(),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_index,
            explanation: "Porque sí.".to_string(),
            topic: Some("General".to_string()),
        }
    }

    fn finished_machine(correct: &[usize], answers: &[usize]) -> QuizMachine {
        let mut machine = QuizMachine::new();
        machine
            .start(correct.iter().map(|&c| question(c)).collect())
            .unwrap();
        for &answer in answers {
            machine.submit_answer(answer).unwrap();
        }
        machine
    }

    #[test]
    fn evaluate_requires_finished_session() {
        let mut machine = QuizMachine::new();
        machine.start(vec![question(0), question(0)]).unwrap();
        machine.submit_answer(0).unwrap();
        assert!(evaluate(&machine.snapshot()).is_err());
    }

    #[test]
    fn perfect_short_exam_passes() {
        let machine = finished_machine(&[0, 1, 2], &[0, 1, 2]);
        let results = evaluate(&machine.snapshot()).unwrap();
        assert_eq!(results.error_count, 0);
        assert!(results.passed);
        assert!(results.missed.is_empty());
    }

    #[test]
    fn all_wrong_short_exam_fails() {
        let machine = finished_machine(&[0, 0, 0], &[1, 1, 1]);
        let results = evaluate(&machine.snapshot()).unwrap();
        assert_eq!(results.error_count, 3);
        assert!(!results.passed);
        assert_eq!(results.missed.len(), 3);
    }

    #[test]
    fn two_errors_out_of_ten_passes() {
        let machine = finished_machine(
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0, 0, 1, 1],
        );
        let results = evaluate(&machine.snapshot()).unwrap();
        assert_eq!(results.score, 8);
        assert_eq!(results.error_count, 2);
        assert!(results.passed);
    }

    #[test]
    fn three_errors_out_of_ten_fails() {
        let machine = finished_machine(
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0, 1, 1, 1],
        );
        let results = evaluate(&machine.snapshot()).unwrap();
        assert_eq!(results.score, 7);
        assert_eq!(results.error_count, 3);
        assert!(!results.passed);
    }

    #[test]
    fn missed_questions_keep_exam_order_and_answers() {
        let machine = finished_machine(&[0, 0, 0], &[0, 1, 0]);
        let results = evaluate(&machine.snapshot()).unwrap();
        assert_eq!(results.missed.len(), 1);
        let missed = &results.missed[0];
        assert_eq!(missed.index, 1);
        assert_eq!(missed.user_answer, 1);
        assert_eq!(missed.question.correct_index, 0);
    }
}
