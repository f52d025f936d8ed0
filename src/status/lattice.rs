//! Merge algebra over status values
//!
//! Statuses form a total order and `merge` is its join:
//!
//! `UNKNOWN < POSSIBLE < NO < LIMITED < YES < WALKIN < EMAIL < CALL < WAITLIST`
//!
//! A join is commutative, associative and idempotent, so folding the signals
//! for one entity yields the same verdict in any order. `UNKNOWN` is the
//! identity element.

use super::value::StatusValue;

/// Position in the merge order. Higher wins.
fn rank(status: StatusValue) -> u8 {
    match status {
        StatusValue::Unknown => 0,
        StatusValue::Possible => 1,
        StatusValue::No => 2,
        StatusValue::Limited => 3,
        StatusValue::Yes => 4,
        // Tie-break between manual values; see DESIGN.md
        StatusValue::Walkin => 5,
        StatusValue::Email => 6,
        StatusValue::Call => 7,
        StatusValue::Waitlist => 8,
    }
}

/// Combine two statuses reported for the same entity
pub fn merge(a: StatusValue, b: StatusValue) -> StatusValue {
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

/// True when both sides are manual values that disagree.
///
/// `merge` still returns a deterministic answer; callers use this to flag the
/// data-integrity problem.
pub fn is_conflict(a: StatusValue, b: StatusValue) -> bool {
    a.is_manual() && b.is_manual() && a != b
}

/// Fold a sequence of statuses with `merge`. An empty sequence yields `UNKNOWN`.
pub fn fold<I>(statuses: I) -> StatusValue
where
    I: IntoIterator<Item = StatusValue>,
{
    statuses.into_iter().fold(StatusValue::Unknown, merge)
}

/// Classify a count of discrete availability indicators.
///
/// `count > threshold` is `YES`, `0 < count <= threshold` is `LIMITED`,
/// zero is `NO`.
pub fn classify_count(count: u32, threshold: u32) -> StatusValue {
    if count == 0 {
        StatusValue::No
    } else if count > threshold {
        StatusValue::Yes
    } else {
        StatusValue::Limited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StatusValue::*;

    #[test]
    fn merge_is_commutative() {
        for a in StatusValue::ALL {
            for b in StatusValue::ALL {
                assert_eq!(merge(a, b), merge(b, a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn merge_is_associative() {
        for a in StatusValue::ALL {
            for b in StatusValue::ALL {
                for c in StatusValue::ALL {
                    let left = merge(merge(a, b), c);
                    assert_eq!(left, merge(a, merge(b, c)), "{a} {b} {c}");
                    assert_eq!(left, merge(merge(c, a), b), "{a} {b} {c}");
                    assert_eq!(left, merge(b, merge(c, a)), "{a} {b} {c}");
                }
            }
        }
    }

    #[test]
    fn precedence_rules() {
        assert_eq!(merge(Call, Yes), Call);
        assert_eq!(merge(No, Walkin), Walkin);
        assert_eq!(merge(Yes, No), Yes);
        assert_eq!(merge(Limited, Yes), Yes);
        assert_eq!(merge(Limited, No), Limited);
        assert_eq!(merge(Limited, Unknown), Limited);
        assert_eq!(merge(Possible, Limited), Limited);
        assert_eq!(merge(No, No), No);
        assert_eq!(merge(Possible, Unknown), Possible);
        assert_eq!(merge(Possible, Possible), Possible);
    }

    #[test]
    fn non_terminal_never_overwrites_terminal() {
        for terminal in StatusValue::ALL.into_iter().filter(|s| s.is_terminal()) {
            assert_eq!(merge(terminal, Unknown), terminal);
            assert_eq!(merge(Possible, terminal), terminal);
        }
    }

    #[test]
    fn unknown_is_identity() {
        for s in StatusValue::ALL {
            assert_eq!(merge(Unknown, s), s);
        }
    }

    #[test]
    fn manual_conflicts_are_detected() {
        assert!(is_conflict(Waitlist, Call));
        assert!(!is_conflict(Call, Call));
        assert!(!is_conflict(Call, Yes));
        assert_eq!(merge(Call, Waitlist), Waitlist);
    }

    #[test]
    fn fold_sequences() {
        assert_eq!(fold([No, No, No]), No);
        assert_eq!(fold([No, Unknown]), No);
        assert_eq!(fold([Unknown, No]), No);
        assert_eq!(fold([Unknown, Unknown]), Unknown);
        assert_eq!(fold(Vec::new()), Unknown);
    }

    #[test]
    fn classify_counts() {
        assert_eq!(classify_count(8, 5), Yes);
        assert_eq!(classify_count(3, 5), Limited);
        assert_eq!(classify_count(5, 5), Limited);
        assert_eq!(classify_count(6, 5), Yes);
        assert_eq!(classify_count(0, 5), No);
    }
}
