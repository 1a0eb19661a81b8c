pub mod exam;
pub mod exam_attempt;
pub mod outbox_event;
pub mod question;

pub(crate) fn decode_err(
    column: &str,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: source.into(),
    }
}
