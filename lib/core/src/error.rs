//! Error handling foundation for the parlance dialog engine.
//!
//! Only the `Result` alias lives here. Every crate owns the error enums for
//! its layer; the turn boundary maps them into a turn error that names the
//! failing handler and keeps the original message.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    fn fails() -> Result<(), Boom> {
        Err(Boom)?
    }

    #[test]
    fn plain_errors_convert_into_reports() {
        let err = fails().expect_err("should fail");
        assert!(err.to_string().contains("boom"));
    }
}
