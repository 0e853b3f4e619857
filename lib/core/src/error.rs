//! Error handling foundation shared by every nurture crate.
//!
//! Crates define their own error enums (step, ledger, store, connector and so
//! on) and return them wrapped in a rootcause [`Report`]. Callers that cross a
//! layer boundary attach their own error as context with `.context()`, so a
//! failed ledger write inside a run reads as "execution failed" on top of
//! "ledger write failed".

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
        Err(Boom.into())
    }

    #[test]
    fn ok_values_pass_through() {
        let ok: Result<i32> = Ok(7);
        assert_eq!(ok.expect("should be ok"), 7);
    }

    #[test]
    fn report_displays_context() {
        let err = fails().unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
