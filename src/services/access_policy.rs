//! Single place for role/ownership decisions. The request layer resolves
//! the caller from its JWT claims and asks the policy before invoking any
//! lifecycle or store operation; nothing else performs role checks.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::exam::Exam;
use crate::models::exam_attempt::ExamAttempt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
    pub department: Option<String>,
    pub semester: Option<i32>,
}

impl TryFrom<&Claims> for Caller {
    type Error = Error;

    fn try_from(claims: &Claims) -> Result<Self> {
        let id = claims
            .sub
            .parse()
            .map_err(|_| Error::Unauthorized("malformed subject claim".to_string()))?;
        let role = claims
            .role
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|_| Error::Unauthorized("missing or unknown role claim".to_string()))?;

        Ok(Caller {
            id,
            role,
            department: claims.department.clone(),
            semester: claims.semester,
        })
    }
}

pub struct AccessPolicy;

impl AccessPolicy {
    /// Only the sitting student may start, and only when the exam's
    /// access rule admits them.
    pub fn can_start(caller: &Caller, exam: &Exam) -> bool {
        caller.role == Role::Student
            && exam.admits(caller.id, caller.department.as_deref(), caller.semester)
    }

    pub fn can_view_exam(caller: &Caller, exam: &Exam) -> bool {
        match caller.role {
            Role::Admin | Role::Faculty => true,
            Role::Student => {
                exam.is_published
                    && exam.admits(caller.id, caller.department.as_deref(), caller.semester)
            }
        }
    }

    /// Update/delete/publish: the creating faculty member, or an admin.
    pub fn can_manage_exam(caller: &Caller, exam: &Exam) -> bool {
        match caller.role {
            Role::Admin => true,
            Role::Faculty => exam.created_by == caller.id,
            Role::Student => false,
        }
    }

    pub fn can_evaluate(caller: &Caller) -> bool {
        matches!(caller.role, Role::Faculty | Role::Admin)
    }

    pub fn can_view_attempt(caller: &Caller, attempt: &ExamAttempt) -> bool {
        attempt.student_id == caller.id || Self::can_evaluate(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::NegativeMarking;
    use chrono::Utc;

    fn caller(role: Role) -> Caller {
        Caller {
            id: Uuid::new_v4(),
            role,
            department: Some("CS".to_string()),
            semester: Some(4),
        }
    }

    fn exam_for(student: Option<Uuid>) -> Exam {
        Exam {
            id: Uuid::new_v4(),
            title: "midterm".to_string(),
            description: None,
            subject: "algorithms".to_string(),
            duration_minutes: 90,
            total_marks: 100.0,
            passing_marks: 40.0,
            start_time: Utc::now(),
            end_time: Utc::now(),
            instructions: None,
            questions: Vec::new(),
            randomize_questions: false,
            allowed_students: student.into_iter().collect(),
            department: None,
            semester: None,
            is_published: true,
            negative_marking: NegativeMarking::default(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_admitted_students_may_start() {
        let student = caller(Role::Student);
        let exam = exam_for(Some(student.id));
        assert!(AccessPolicy::can_start(&student, &exam));

        let other = caller(Role::Student);
        assert!(!AccessPolicy::can_start(&other, &exam));

        let faculty = caller(Role::Faculty);
        assert!(!AccessPolicy::can_start(&faculty, &exam_for(Some(faculty.id))));
    }

    #[test]
    fn department_and_semester_match_admits() {
        let student = caller(Role::Student);
        let mut exam = exam_for(None);
        exam.department = Some("CS".to_string());
        exam.semester = Some(4);
        assert!(AccessPolicy::can_start(&student, &exam));

        exam.semester = Some(5);
        assert!(!AccessPolicy::can_start(&student, &exam));
    }

    #[test]
    fn evaluation_requires_faculty_or_admin() {
        assert!(AccessPolicy::can_evaluate(&caller(Role::Faculty)));
        assert!(AccessPolicy::can_evaluate(&caller(Role::Admin)));
        assert!(!AccessPolicy::can_evaluate(&caller(Role::Student)));
    }

    #[test]
    fn exam_management_is_creator_or_admin() {
        let faculty = caller(Role::Faculty);
        let mut exam = exam_for(None);
        assert!(!AccessPolicy::can_manage_exam(&faculty, &exam));
        exam.created_by = faculty.id;
        assert!(AccessPolicy::can_manage_exam(&faculty, &exam));
        assert!(AccessPolicy::can_manage_exam(&caller(Role::Admin), &exam));
    }
}
