//! Read-only guard for generated statements.
//!
//! This is a prefix check on the trimmed, upper-cased text. It does not
//! parse the statement: `SELECTX ...` passes, and a `SELECT` that calls
//! something with side effects passes too. Anything stronger is left to the
//! store's own permissions.

use crate::error::{GraphError, Result};

pub const REJECTION_REASON: &str = "non-select statement";

/// Accept `query` iff, after trimming, it starts with `SELECT` in any case.
///
/// The original text is not modified; callers execute it as given.
pub fn validate_read_only(query: &str) -> Result<()> {
    if query.trim().to_uppercase().starts_with("SELECT") {
        Ok(())
    } else {
        Err(GraphError::QueryRejected {
            reason: REJECTION_REASON,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rejected(query: &str) -> bool {
        matches!(
            validate_read_only(query),
            Err(GraphError::QueryRejected {
                reason: REJECTION_REASON
            })
        )
    }

    #[test]
    fn accepts_graph_select() {
        assert!(validate_read_only(
            "SELECT person.name FROM GRAPH PhotosGraph MATCH (person:Person)"
        )
        .is_ok());
    }

    #[test]
    fn rejects_mutations_and_empty() {
        assert!(rejected("DELETE FROM Person"));
        assert!(rejected("insert into Person (person_id) values ('x')"));
        assert!(rejected("UPDATE Photo SET location_name = 'x'"));
        assert!(rejected(""));
        assert!(rejected("   \n\t"));
        assert!(rejected("-- comment\nSELECT 1"));
    }

    #[test]
    fn trims_and_ignores_case() {
        assert!(validate_read_only(" select * from Person").is_ok());
        assert!(validate_read_only("\n\tSeLeCt 1").is_ok());
        assert!(validate_read_only("SELECT").is_ok());
    }

    #[test]
    fn prefix_only_limitation() {
        // Known limitation: only the leading token is inspected.
        assert!(validate_read_only("SELECTX foo").is_ok());
        assert!(validate_read_only("SELECT 1; DELETE FROM Person").is_ok());
    }

    #[test]
    fn rejection_does_not_echo_query() {
        let err = validate_read_only("DROP TABLE Person").unwrap_err();
        assert!(!err.to_string().contains("DROP"));
    }

    proptest! {
        #[test]
        fn anything_not_starting_with_select_is_rejected(
            lead in "[ \t\n]{0,3}",
            body in "[A-Za-z ]{0,24}",
        ) {
            let query = format!("{lead}{body}");
            let accepted = query.trim().to_uppercase().starts_with("SELECT");
            prop_assert_eq!(validate_read_only(&query).is_ok(), accepted);
        }

        #[test]
        fn select_prefix_always_accepted(
            select in "(?i)select",
            lead in "[ \t\n]{0,3}",
            rest in ".{0,40}",
        ) {
            let query = format!("{lead}{select}{rest}");
            prop_assert!(validate_read_only(&query).is_ok());
        }
    }
}
