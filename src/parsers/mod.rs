pub mod gocover;

use crate::error::Result;
use crate::model::StatementRange;

/// Turns raw profile bytes into statement ranges.
pub trait ProfileParser {
    /// Parse the whole profile. Malformed input is an error; no partial
    /// result is returned.
    fn parse(&self, input: &[u8]) -> Result<Vec<StatementRange>>;

    /// Copy of `input` holding only the blocks whose path passes `keep`,
    /// in the same format. Meant for input `parse` already accepted.
    fn filter(&self, input: &[u8], keep: &dyn Fn(&str) -> bool) -> Vec<u8>;
}
