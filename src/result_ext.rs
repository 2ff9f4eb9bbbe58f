//! Log-and-propagate helper for `Result`

use tracing::error;

pub trait ResultExt<T, E, S>
where
    S: ToString,
{
    /// Log the error with the caller's location, then return `self` untouched
    fn log(self, context: S) -> Result<T, E>;
}

impl<T, E: std::fmt::Display, S: ToString> ResultExt<T, E, S> for Result<T, E> {
    #[track_caller]
    fn log(self, context: S) -> Result<T, E> {
        if let Err(err) = &self {
            let location = std::panic::Location::caller();
            error!(
                err = %err,
                file = %format!("{}:{}", location.file(), location.line()),
                "{}",
                context.to_string()
            );
        }
        self
    }
}
