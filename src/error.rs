use std::fmt::Display;

use anyhow::Error;

/// Fail without panicking: print the error with its causes and exit with `1`.
pub trait NiceError<T, E> {
    /// Exit with `1` if the value is not present. Otherwise return the content.
    fn nice_unwrap(self) -> T;

    /// Exit with `1` if the value is not present, printing also the message.
    fn nice_expect<S: Display + Send + Sync + 'static>(self, mex: S) -> T;
}

fn fail(error: Error) -> ! {
    debug!("{:?}", error);
    let mut fail: &dyn std::error::Error = error.as_ref();
    eprintln!("Error: {fail}");
    while let Some(cause) = fail.source() {
        eprintln!("\nCaused by:\n    {cause}");
        fail = cause;
    }
    std::process::exit(1);
}

impl<T> NiceError<T, Error> for Result<T, Error> {
    fn nice_unwrap(self) -> T {
        self.unwrap_or_else(|e| fail(e))
    }

    fn nice_expect<S: Display + Send + Sync + 'static>(self, mex: S) -> T {
        self.unwrap_or_else(|e| fail(e.context(mex)))
    }
}
