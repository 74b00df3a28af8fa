//! Momentum confirmation on Heikin-Ashi closes.

/// True at index i iff the last `lookback` steps ending at i all rose:
/// `series[i-j] < series[i-j+1]` for every j in 1..=lookback.
///
/// Indices with fewer than `lookback` predecessors are false. Any NaN in the
/// window compares false and therefore breaks confirmation.
pub fn momentum_confirmation(series: &[f64], lookback: usize) -> Vec<bool> {
    let n = series.len();
    let mut confirmed = vec![false; n];
    if lookback == 0 {
        return confirmed;
    }

    // Length of the strictly rising run ending at each index.
    let mut run = 0usize;
    for i in 1..n {
        run = if series[i - 1] < series[i] { run + 1 } else { 0 };
        confirmed[i] = run >= lookback;
    }

    confirmed
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct transcription of the definition, for cross-checking.
    fn naive(series: &[f64], lookback: usize, i: usize) -> bool {
        i >= lookback && (1..=lookback).all(|j| series[i - j] < series[i - j + 1])
    }

    #[test]
    fn rising_run_confirms_after_lookback() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(momentum_confirmation(&s, 2), vec![false, false, true, true]);
    }

    #[test]
    fn equal_values_break_confirmation() {
        let s = [1.0, 2.0, 2.0, 3.0, 4.0];
        assert_eq!(
            momentum_confirmation(&s, 2),
            vec![false, false, false, false, true]
        );
    }

    #[test]
    fn matches_definition() {
        let s = [5.0, 4.0, 4.5, 4.8, 5.2, 5.1, 5.3, 5.4, 5.5, 5.0];
        for lookback in 1..4 {
            let got = momentum_confirmation(&s, lookback);
            for i in 0..s.len() {
                assert_eq!(got[i], naive(&s, lookback, i), "lookback={lookback} i={i}");
            }
        }
    }

    #[test]
    fn nan_breaks_run() {
        let s = [1.0, 2.0, f64::NAN, 3.0, 4.0, 5.0];
        let got = momentum_confirmation(&s, 2);
        assert!(!got[2] && !got[3] && !got[4]);
        assert!(got[5]);
    }
}
