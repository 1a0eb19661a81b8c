pub mod access_policy;
pub mod attempt_service;
pub mod exam_service;
pub mod grading;
pub mod notification_service;
pub mod question_service;
