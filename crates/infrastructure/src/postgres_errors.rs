use nodeconductor_core::AppError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Maps unique violations to `Conflict` and everything else to `Internal`.
pub(crate) fn unique_conflict_or_internal(
    error: sqlx::Error,
    conflict_message: &str,
    operation: &str,
) -> AppError {
    if database_code(&error).as_deref() == Some(UNIQUE_VIOLATION) {
        return AppError::Conflict(conflict_message.to_owned());
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}

/// Maps foreign key violations to `Conflict` and everything else to `Internal`.
pub(crate) fn reference_conflict_or_internal(
    error: sqlx::Error,
    conflict_message: &str,
    operation: &str,
) -> AppError {
    if database_code(&error).as_deref() == Some(FOREIGN_KEY_VIOLATION) {
        return AppError::Conflict(conflict_message.to_owned());
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}

fn database_code(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(database_error) => {
            database_error.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}
