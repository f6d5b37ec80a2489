// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Bounded rational approximation.

/// Find `n / d` closest to `numerator / denominator` with
/// `n <= max_n` and `d <= max_d`.
///
/// Walks the continued fraction expansion. When the next convergent
/// exceeds a bound, it picks between the previous convergent and the
/// largest semiconvergent that still fits. Either result may have a
/// zero numerator when the ratio is smaller than `1 / max_d`.
pub fn best_approximation(numerator: u64, denominator: u64, max_n: u64, max_d: u64) -> (u64, u64) {
    let (mut n, mut d) = (numerator, denominator);
    // Previous two convergents: n0/d0, n1/d1.
    let (mut n0, mut d0) = (0u64, 1u64);
    let (mut n1, mut d1) = (1u64, 0u64);

    while d != 0 {
        let a = n / d;
        let dp = d;
        d = n % d;
        n = dp;

        let n2 = n0.saturating_add(a.saturating_mul(n1));
        let d2 = d0.saturating_add(a.saturating_mul(d1));

        if n2 > max_n || d2 > max_d {
            let mut t = u64::MAX;
            if d1 != 0 {
                t = (max_d - d0) / d1;
            }
            if n1 != 0 {
                t = t.min((max_n - n0) / n1);
            }
            // The semiconvergent wins when t is more than half of a,
            // or exactly half and closer.
            if d1 == 0 || 2 * t > a || (2 * t == a && d0 * dp > d1 * d) {
                n1 = n0 + t * n1;
                d1 = d0 + t * d1;
            }
            break;
        }

        n0 = n1;
        n1 = n2;
        d0 = d1;
        d1 = d2;
    }

    (n1, d1)
}
