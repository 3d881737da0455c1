//! Boundary planning: turn a split spec into an ordered list of time windows.
//!
//! Planning is pure and deterministic. With the default options the windows
//! start at 0, are contiguous, never overlap, and the last one ends exactly at
//! the total duration.

use sf_core::config::MAX_OVERLAP_RATIO;
use sf_core::{Error, Result, SplitSpec, Window, BYTES_PER_MB, MAX_PARTS};

/// A trailing [`SplitSpec::ByTime`] remainder shorter than this (seconds) is
/// floating-point residue and folded into the previous window.
pub const TOLERANCE: f64 = 1e-6;

/// Optional planning behaviour beyond the zero-overlap default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlanOptions {
    /// Every window after the first starts this fraction of the nominal part
    /// length earlier. Must be in `[0, 0.5)`.
    pub overlap_ratio: f64,
}

/// Plan contiguous, non-overlapping windows covering `[0, total_duration]`.
///
/// # Errors
///
/// - [`Error::Validation`] if `spec` is below the policy minimums or the
///   duration is not finite.
/// - [`Error::EmptyInput`] if `total_duration` is zero (or negative), or the
///   spec asks for more than [`MAX_PARTS`] parts.
pub fn plan(total_duration: f64, total_size_bytes: u64, spec: &SplitSpec) -> Result<Vec<Window>> {
    plan_with(total_duration, total_size_bytes, spec, &PlanOptions::default())
}

/// [`plan`] with explicit [`PlanOptions`].
pub fn plan_with(
    total_duration: f64,
    total_size_bytes: u64,
    spec: &SplitSpec,
    options: &PlanOptions,
) -> Result<Vec<Window>> {
    spec.validate()?;

    let overlap_ratio = options.overlap_ratio;
    if !(0.0..MAX_OVERLAP_RATIO).contains(&overlap_ratio) {
        return Err(Error::Validation(format!(
            "overlap ratio must be in [0, {MAX_OVERLAP_RATIO}), got {overlap_ratio}"
        )));
    }
    if !total_duration.is_finite() {
        return Err(Error::Validation(format!(
            "total duration must be finite, got {total_duration}"
        )));
    }
    if total_duration <= 0.0 {
        return Err(Error::EmptyInput(format!(
            "total duration is {total_duration}s; nothing to split"
        )));
    }

    let (count, step) = match *spec {
        SplitSpec::Parts { count } => (count as usize, total_duration / f64::from(count)),
        SplitSpec::BySize { target_mb } => {
            let count = part_count_for_size(total_size_bytes, target_mb);
            (count, total_duration / count as f64)
        }
        SplitSpec::ByTime { target_seconds } => {
            let mut count = ((total_duration / target_seconds).ceil() as usize).max(1);
            if count > 1 && total_duration - (count - 1) as f64 * target_seconds <= TOLERANCE {
                count -= 1;
            }
            (count, target_seconds)
        }
    };

    if count > MAX_PARTS {
        return Err(Error::EmptyInput(format!(
            "{spec} of a {total_duration}s input needs {count} parts; at most {MAX_PARTS} are allowed"
        )));
    }

    let mut windows: Vec<Window> = Vec::with_capacity(count);
    for i in 0..count {
        let start = i as f64 * step;
        let end = if i + 1 == count {
            total_duration
        } else {
            ((i + 1) as f64 * step).min(total_duration)
        };
        let duration = end - start;
        if duration <= 0.0 {
            continue;
        }
        windows.push(Window {
            index: windows.len(),
            start,
            duration,
        });
    }

    let Some(last) = windows.last_mut() else {
        return Err(Error::EmptyInput(format!(
            "{spec} of a {total_duration}s input produced no windows"
        )));
    };
    last.duration = total_duration - last.start;

    if overlap_ratio > 0.0 {
        let overlap = overlap_ratio * step;
        for w in windows.iter_mut().skip(1) {
            let end = w.end();
            w.start = (w.start - overlap).max(0.0);
            w.duration = end - w.start;
        }
    }

    tracing::debug!(
        "planned {} window(s) for {total_duration:.3}s with {spec}",
        windows.len()
    );

    Ok(windows)
}

/// Number of parts needed so each is roughly `target_mb` megabytes. Never 0.
pub fn part_count_for_size(total_size_bytes: u64, target_mb: u64) -> usize {
    if target_mb == 0 {
        return 1;
    }
    let size_mb = total_size_bytes as f64 / BYTES_PER_MB as f64;
    ((size_mb / target_mb as f64).ceil() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const MB: u64 = BYTES_PER_MB;

    fn spans(windows: &[Window]) -> Vec<(f64, f64)> {
        windows.iter().map(|w| (w.start, w.duration)).collect()
    }

    fn assert_tiles(windows: &[Window], total: f64) {
        assert!(!windows.is_empty());
        assert_eq!(windows[0].start, 0.0);
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.index, i);
            assert!(w.duration > 0.0, "window {i} has duration {}", w.duration);
            assert!(w.end() <= total + TOLERANCE);
        }
        for pair in windows.windows(2) {
            assert!(
                (pair[0].end() - pair[1].start).abs() < TOLERANCE,
                "gap or overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
        let last = windows.last().unwrap();
        assert!((last.end() - total).abs() < TOLERANCE);
    }

    #[test]
    fn four_equal_parts() {
        let w = plan(100.0, 0, &SplitSpec::Parts { count: 4 }).unwrap();
        assert_eq!(spans(&w), vec![(0.0, 25.0), (25.0, 25.0), (50.0, 25.0), (75.0, 25.0)]);
    }

    #[test]
    fn by_time_clamps_last_window() {
        let w = plan(95.0, 0, &SplitSpec::ByTime { target_seconds: 30.0 }).unwrap();
        assert_eq!(spans(&w), vec![(0.0, 30.0), (30.0, 30.0), (60.0, 30.0), (90.0, 5.0)]);
    }

    #[test]
    fn by_time_exact_multiple() {
        let w = plan(90.0, 0, &SplitSpec::ByTime { target_seconds: 30.0 }).unwrap();
        assert_eq!(w.len(), 3);
        assert_tiles(&w, 90.0);
    }

    #[test]
    fn by_time_shorter_than_target_is_single_window() {
        let w = plan(7.5, 0, &SplitSpec::ByTime { target_seconds: 30.0 }).unwrap();
        assert_eq!(spans(&w), vec![(0.0, 7.5)]);
    }

    #[test]
    fn by_size_derives_part_count() {
        assert_eq!(part_count_for_size(50 * MB, 10), 5);
        assert_eq!(part_count_for_size(50 * MB + 1, 10), 6);
        assert_eq!(part_count_for_size(0, 10), 1);
        assert_eq!(part_count_for_size(3 * MB, 10), 1);

        let by_size = plan(123.4, 50 * MB, &SplitSpec::BySize { target_mb: 10 }).unwrap();
        let by_parts = plan(123.4, 50 * MB, &SplitSpec::Parts { count: 5 }).unwrap();
        assert_eq!(by_size, by_parts);
    }

    #[test]
    fn by_size_small_file_is_single_window() {
        let w = plan(60.0, MB / 2, &SplitSpec::BySize { target_mb: 1 }).unwrap();
        assert_eq!(spans(&w), vec![(0.0, 60.0)]);
    }

    #[test]
    fn parts_count_and_sum_hold_across_inputs() {
        let durations = [1.5e-6, 0.001, 1.0, 10.0 / 3.0, 59.97, 100.0, 3601.123_456, 86_399.9];
        for &total in &durations {
            for count in 2..=17u32 {
                let w = plan(total, 0, &SplitSpec::Parts { count }).unwrap();
                assert_eq!(w.len(), count as usize, "total={total} count={count}");
                let sum: f64 = w.iter().map(|w| w.duration).sum();
                assert!((sum - total).abs() < TOLERANCE, "total={total} count={count} sum={sum}");
                assert_tiles(&w, total);
            }
        }
    }

    #[test]
    fn every_mode_tiles_the_timeline() {
        let specs = [
            SplitSpec::Parts { count: 3 },
            SplitSpec::Parts { count: 7 },
            SplitSpec::BySize { target_mb: 1 },
            SplitSpec::BySize { target_mb: 25 },
            SplitSpec::ByTime { target_seconds: 10.0 },
            SplitSpec::ByTime { target_seconds: 33.3 },
        ];
        for spec in &specs {
            for &total in &[0.5, 12.0, 95.0, 1000.001, 7200.0] {
                let w = plan(total, 137 * MB, spec).unwrap();
                assert_tiles(&w, total);
            }
        }
    }

    #[test]
    fn floating_point_residue_is_absorbed() {
        // 0.1 * 3 > 0.3 in binary floating point.
        let total = 0.3 * 100.0;
        let w = plan(total, 0, &SplitSpec::ByTime { target_seconds: 10.0 }).unwrap();
        assert_eq!(w.len(), 3);
        assert_tiles(&w, total);

        let total = 30.000_000_000_1;
        let w = plan(total, 0, &SplitSpec::ByTime { target_seconds: 10.0 }).unwrap();
        assert_eq!(w.len(), 3);
        assert_tiles(&w, total);
    }

    #[test]
    fn tiny_input_still_gets_every_part() {
        let w = plan(1.5e-6, 0, &SplitSpec::Parts { count: 2 }).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w[1].start, 7.5e-7);
        assert_tiles(&w, 1.5e-6);
    }

    #[test]
    fn absurd_part_count_is_empty_input() {
        assert_matches!(
            plan(100.0, 0, &SplitSpec::Parts { count: u32::MAX }),
            Err(Error::EmptyInput(_))
        );
        assert_matches!(
            plan(1e9, 0, &SplitSpec::ByTime { target_seconds: 10.0 }),
            Err(Error::EmptyInput(_))
        );
        let w = plan(100.0, 0, &SplitSpec::Parts { count: MAX_PARTS as u32 }).unwrap();
        assert_eq!(w.len(), MAX_PARTS);
    }

    #[test]
    fn zero_duration_is_empty_input() {
        for spec in [
            SplitSpec::Parts { count: 2 },
            SplitSpec::BySize { target_mb: 10 },
            SplitSpec::ByTime { target_seconds: 30.0 },
        ] {
            assert_matches!(plan(0.0, 50 * MB, &spec), Err(Error::EmptyInput(_)));
        }
        assert_matches!(
            plan(-1.0, 0, &SplitSpec::Parts { count: 2 }),
            Err(Error::EmptyInput(_))
        );
    }

    #[test]
    fn malformed_inputs_are_validation_errors() {
        assert_matches!(plan(10.0, 0, &SplitSpec::Parts { count: 1 }), Err(Error::Validation(_)));
        assert_matches!(plan(10.0, 0, &SplitSpec::BySize { target_mb: 0 }), Err(Error::Validation(_)));
        assert_matches!(
            plan(10.0, 0, &SplitSpec::ByTime { target_seconds: 5.0 }),
            Err(Error::Validation(_))
        );
        assert_matches!(
            plan(f64::INFINITY, 0, &SplitSpec::Parts { count: 2 }),
            Err(Error::Validation(_))
        );
        assert_matches!(
            plan(f64::NAN, 0, &SplitSpec::Parts { count: 2 }),
            Err(Error::Validation(_))
        );
    }

    #[test]
    fn overlap_extends_windows_backwards() {
        let opts = PlanOptions { overlap_ratio: 0.05 };
        let w = plan_with(100.0, 0, &SplitSpec::Parts { count: 4 }, &opts).unwrap();
        let expected = [(0.0, 25.0), (23.75, 26.25), (48.75, 26.25), (73.75, 26.25)];
        assert_eq!(w.len(), expected.len());
        for (win, (start, duration)) in w.iter().zip(expected) {
            assert!((win.start - start).abs() < TOLERANCE, "{win:?}");
            assert!((win.duration - duration).abs() < TOLERANCE, "{win:?}");
        }
        assert!((w.last().unwrap().end() - 100.0).abs() < TOLERANCE);
    }

    #[test]
    fn overlap_uses_target_for_by_time() {
        let opts = PlanOptions { overlap_ratio: 0.1 };
        let w = plan_with(95.0, 0, &SplitSpec::ByTime { target_seconds: 30.0 }, &opts).unwrap();
        assert!((w[1].start - 27.0).abs() < TOLERANCE);
        assert!((w[3].start - 87.0).abs() < TOLERANCE);
        assert!((w[3].end() - 95.0).abs() < TOLERANCE);
    }

    #[test]
    fn overlap_out_of_range_is_rejected() {
        let spec = SplitSpec::Parts { count: 2 };
        for ratio in [-0.01, 0.5, 1.0, f64::NAN] {
            let opts = PlanOptions { overlap_ratio: ratio };
            assert_matches!(plan_with(10.0, 0, &spec, &opts), Err(Error::Validation(_)));
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let spec = SplitSpec::ByTime { target_seconds: 12.5 };
        assert_eq!(plan(321.0, 0, &spec).unwrap(), plan(321.0, 0, &spec).unwrap());
    }
}
