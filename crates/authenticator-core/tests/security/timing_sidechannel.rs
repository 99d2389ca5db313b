//! Timing side-channel checks for `validate`.
//!
//! Uses Welch's t-test on the time taken to validate codes. Two wrong codes
//! that differ from the expected one at the first and at the last digit
//! must be indistinguishable (|t| < 4.5); this runs on every `cargo test`.
//! The slowest samples of each class are dropped before comparing, so a
//! few preemptions do not decide the outcome.
//!
//! The longer comparison of a matching against a non-matching code is
//! more sensitive to scheduler noise and only runs with `--ignored`.

use std::time::Instant;

use authenticator_core::{totp, validate, Algorithm, CodeLength, Digest, TimeStep};

/// Number of timing samples per class.
const SAMPLES: usize = 10_000;

/// Samples per class for the test that runs by default.
const QUICK_SAMPLES: usize = 2_000;

/// Share of each class kept after dropping the slowest samples.
const KEEP_FRACTION: f64 = 0.9;

/// Welch's t-test threshold. |t| < 4.5 means no detectable timing difference.
const T_THRESHOLD: f64 = 4.5;

const SECRET: &[u8] = b"12345678901234567890";
const TIME: u64 = 1_234_567_890;

#[inline(never)]
fn black_box_validate(code: &str) -> bool {
    let result = validate(
        SECRET,
        Algorithm::Totp(TimeStep::DEFAULT),
        Digest::Sha1,
        CodeLength::SIX,
        code,
        TIME,
        1,
    )
    .expect("validate should not error during timing test");
    std::hint::black_box(result.is_match())
}

/// `t = (mean_a - mean_b) / sqrt(var_a/n_a + var_b/n_b)`
#[allow(clippy::cast_precision_loss)]
fn welch_t_statistic(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 || b.len() < 2 {
        return f64::NAN;
    }

    let n_a = a.len() as f64;
    let n_b = b.len() as f64;

    let mean_a: f64 = a.iter().sum::<f64>() / n_a;
    let mean_b: f64 = b.iter().sum::<f64>() / n_b;

    let var_a: f64 = a.iter().map(|x| (x - mean_a).powi(2)).sum::<f64>() / (n_a - 1.0);
    let var_b: f64 = b.iter().map(|x| (x - mean_b).powi(2)).sum::<f64>() / (n_b - 1.0);

    let denominator = (var_a / n_a + var_b / n_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    (mean_a - mean_b) / denominator
}

/// Replace the digit at `index` with a different digit.
fn flip_digit(code: &str, index: usize) -> String {
    code.char_indices()
        .map(|(i, c)| {
            if i == index {
                if c == '0' {
                    '1'
                } else {
                    '0'
                }
            } else {
                c
            }
        })
        .collect()
}

/// Sort `samples` and drop the slowest tail.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn trimmed(mut samples: Vec<f64>) -> Vec<f64> {
    samples.sort_by(f64::total_cmp);
    let keep = (samples.len() as f64 * KEEP_FRACTION) as usize;
    samples.truncate(keep);
    samples
}

fn warm_up(codes: &[&str]) {
    for _ in 0..100 {
        for code in codes {
            black_box_validate(code);
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn sample(code: &str) -> f64 {
    let start = Instant::now();
    let _ = black_box_validate(code);
    start.elapsed().as_nanos() as f64
}

#[test]
fn mismatch_position_does_not_change_validate_timing() {
    let valid = totp(SECRET, TIME, TimeStep::DEFAULT, Digest::Sha1, CodeLength::SIX).unwrap();
    let first_wrong = flip_digit(&valid, 0);
    let last_wrong = flip_digit(&valid, 5);
    warm_up(&[first_wrong.as_str(), last_wrong.as_str()]);

    let mut early = Vec::with_capacity(QUICK_SAMPLES);
    let mut late = Vec::with_capacity(QUICK_SAMPLES);
    for _ in 0..QUICK_SAMPLES {
        early.push(sample(&first_wrong));
        late.push(sample(&last_wrong));
    }

    let t = welch_t_statistic(&trimmed(early), &trimmed(late)).abs();
    eprintln!("timing: |t| first/last digit = {t:.2} ({QUICK_SAMPLES} samples per class)");
    assert!(
        t < T_THRESHOLD,
        "validate leaks the position of the first wrong digit: |t| = {t:.2}"
    );
}

#[test]
#[ignore = "long statistical timing test; run with --ignored on an idle machine"]
fn validate_timing_does_not_depend_on_mismatch_position() {
    let valid = totp(SECRET, TIME, TimeStep::DEFAULT, Digest::Sha1, CodeLength::SIX).unwrap();
    let first_wrong = flip_digit(&valid, 0);
    let last_wrong = flip_digit(&valid, 5);

    warm_up(&[valid.as_str(), first_wrong.as_str(), last_wrong.as_str()]);

    let mut matching = Vec::with_capacity(SAMPLES);
    let mut early = Vec::with_capacity(SAMPLES);
    let mut late = Vec::with_capacity(SAMPLES);

    // Interleave the classes to cancel out drift.
    for _ in 0..SAMPLES {
        matching.push(sample(&valid));
        early.push(sample(&first_wrong));
        late.push(sample(&last_wrong));
    }

    let (matching, early, late) = (trimmed(matching), trimmed(early), trimmed(late));
    let t_match = welch_t_statistic(&matching, &early).abs();
    let t_position = welch_t_statistic(&early, &late).abs();

    eprintln!(
        "timing: |t| match/mismatch = {t_match:.2}, |t| first/last digit = {t_position:.2} \
         (threshold {T_THRESHOLD}, {SAMPLES} samples per class)"
    );

    assert!(
        t_match < T_THRESHOLD,
        "validate leaks whether the code matched: |t| = {t_match:.2}"
    );
    assert!(
        t_position < T_THRESHOLD,
        "validate leaks the position of the first wrong digit: |t| = {t_position:.2}"
    );
}

#[test]
fn welch_t_test_identical_distributions() {
    let a = vec![1.0; 100];
    let b = vec![1.0; 100];
    assert!(welch_t_statistic(&a, &b).abs() < f64::EPSILON);
}

#[test]
fn welch_t_test_separated_distributions() {
    let a: Vec<f64> = (0..100).map(|i| 100.0 + f64::from(i % 3)).collect();
    let b: Vec<f64> = (0..100).map(|i| 200.0 + f64::from(i % 3)).collect();
    assert!(welch_t_statistic(&a, &b).abs() > T_THRESHOLD);
}

#[test]
fn trimmed_drops_the_slowest_tail() {
    let samples: Vec<f64> = (0..100).rev().map(f64::from).collect();
    let kept = trimmed(samples);
    assert_eq!(kept.len(), 90);
    assert!(kept.iter().all(|&x| x < 90.0));
}

#[test]
fn flip_digit_changes_exactly_one_position() {
    assert_eq!(flip_digit("123456", 0), "023456");
    assert_eq!(flip_digit("023450", 5), "023451");
}
