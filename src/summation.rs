//! Three ways to sum the integers `1..=n`.
//!
//! Each returns `None` for `n == 0` and when the sum does not fit in a `u64`.

/// Deepest recursion [`sum_to_n_recursive`] will attempt.
pub const RECURSION_LIMIT: u64 = 10_000;

/// Closed form `n(n+1)/2`. O(1).
pub fn sum_to_n_formula(n: u64) -> Option<u64> {
    if n == 0 {
        return None;
    }
    let n = u128::from(n);
    u64::try_from(n * (n + 1) / 2).ok()
}

/// Running total. O(n) time, O(1) space.
pub fn sum_to_n_iterative(n: u64) -> Option<u64> {
    if n == 0 {
        return None;
    }
    (1..=n).try_fold(0u64, |sum, i| sum.checked_add(i))
}

/// `n + sum(n - 1)`. O(n) time and stack; `None` past [`RECURSION_LIMIT`].
pub fn sum_to_n_recursive(n: u64) -> Option<u64> {
    if n == 0 || n > RECURSION_LIMIT {
        return None;
    }
    if n == 1 {
        return Some(1);
    }
    sum_to_n_recursive(n - 1)?.checked_add(n)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Formula,
    Iterative,
    Recursive,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Formula, Method::Iterative, Method::Recursive];

    pub fn name(self) -> &'static str {
        match self {
            Method::Formula => "formula",
            Method::Iterative => "iterative",
            Method::Recursive => "recursive",
        }
    }

    pub fn sum(self, n: u64) -> Option<u64> {
        match self {
            Method::Formula => sum_to_n_formula(n),
            Method::Iterative => sum_to_n_iterative(n),
            Method::Recursive => sum_to_n_recursive(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values() {
        for method in Method::ALL {
            assert_eq!(method.sum(1), Some(1), "{}", method.name());
            assert_eq!(method.sum(5), Some(15), "{}", method.name());
            assert_eq!(method.sum(100), Some(5050), "{}", method.name());
        }
    }

    #[test]
    fn zero_has_no_sum() {
        for method in Method::ALL {
            assert_eq!(method.sum(0), None);
        }
    }

    #[test]
    fn methods_agree() {
        for n in [2, 7, 999, RECURSION_LIMIT] {
            let expected = sum_to_n_formula(n);
            assert_eq!(sum_to_n_iterative(n), expected);
            assert_eq!(sum_to_n_recursive(n), expected);
        }
    }

    #[test]
    fn overflow_is_none() {
        assert_eq!(sum_to_n_formula(u64::MAX), None);
        // Largest n whose sum still fits.
        assert_eq!(sum_to_n_formula(6_074_000_999), Some(18_446_744_070_963_499_500));
        assert_eq!(sum_to_n_formula(6_074_001_000), None);
        assert_eq!(sum_to_n_recursive(RECURSION_LIMIT + 1), None);
    }
}
