#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("row not found")]
    NotFound,
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

pub(crate) fn convert_error(why: sqlx::Error) -> DatabaseError {
    match why {
        sqlx::Error::RowNotFound => DatabaseError::NotFound,
        other => DatabaseError::Sql(other),
    }
}
