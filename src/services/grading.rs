//! Pure grading passes over an attempt's answer sheet. No storage, no
//! side effects; `submit` and `evaluate` feed these folds and persist the
//! result.

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::exam::{Exam, NegativeMarking};
use crate::models::exam_attempt::Answer;
use crate::models::question::Question;

#[derive(Debug)]
pub struct ObjectiveGrading {
    pub answers: Vec<Answer>,
    pub total: f64,
    /// True when no answer references a descriptive or coding question,
    /// i.e. the attempt can be finalized without manual evaluation.
    pub fully_graded: bool,
}

/// Grades every objective (multiple-choice / true-false) answer by exact
/// text match against the question's designated correct option. A null
/// payload compares unequal, so an unanswered question takes the
/// wrong-answer branch, including the negative-marking penalty when that
/// is enabled. Descriptive and coding answers pass through untouched.
pub fn grade_objective(
    answers: &[Answer],
    questions: &HashMap<Uuid, Question>,
    negative_marking: NegativeMarking,
) -> ObjectiveGrading {
    let mut fully_graded = true;

    let graded: Vec<Answer> = answers
        .iter()
        .map(|answer| {
            let mut graded = answer.clone();
            let Some(question) = questions.get(&answer.question_id) else {
                return graded;
            };

            if !question.question_type.is_objective() {
                fully_graded = false;
                return graded;
            }

            let given = answer.answer.as_ref().and_then(|v| v.as_str());
            let correct = question.correct_option_text();

            if correct.is_some() && given == correct {
                graded.is_correct = true;
                graded.marks_obtained = question.points;
            } else {
                graded.is_correct = false;
                graded.marks_obtained = if negative_marking.enabled {
                    -negative_marking.marks_per_wrong
                } else {
                    0.0
                };
            }
            graded
        })
        .collect();

    let total = total_marks(&graded);
    ObjectiveGrading {
        answers: graded,
        total,
        fully_graded,
    }
}

/// Overwrites `marks_obtained` for each referenced answer. Scores naming
/// a question the attempt does not hold are ignored.
pub fn apply_manual_scores(answers: &mut [Answer], scores: &[(Uuid, f64)]) {
    for (question_id, marks) in scores {
        if let Some(answer) = answers.iter_mut().find(|a| a.question_id == *question_id) {
            answer.marks_obtained = *marks;
        }
    }
}

/// The total is always a fold over the full answer sheet, so a partial
/// manual pass still counts previously auto-graded marks.
pub fn total_marks(answers: &[Answer]) -> f64 {
    answers.iter().map(|a| a.marks_obtained).sum()
}

/// Percentage is a plain unclamped ratio (a negative total under negative
/// marking yields a negative percentage); passing is boundary-inclusive.
pub fn outcome(total: f64, exam: &Exam) -> (f64, bool) {
    let percentage = if exam.total_marks > 0.0 {
        total / exam.total_marks * 100.0
    } else {
        0.0
    };
    (percentage, total >= exam.passing_marks)
}
