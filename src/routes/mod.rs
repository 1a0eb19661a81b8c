pub mod attempt_routes;
pub mod exam_routes;
pub mod health;
pub mod question_routes;
