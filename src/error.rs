use std::fmt;

/// Turns a `Result` into an `Option`, logging the error.
///
/// Meant for background paths that have no caller to report failures to.
pub trait ResultOkLogExt<T, E> {
    fn ok_or_log(self, context: impl fmt::Display) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_or_log(self, context: impl fmt::Display) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{context}: {err}");
                None
            }
        }
    }
}
