// src/behavior/filters.rs

/// Odd filter window covering roughly `seconds` at the given frame rate.
pub fn odd_window(seconds: f32, frame_rate: f32) -> usize {
    let n = (seconds * frame_rate).round().max(1.0) as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Majority vote over a centered window; the window shrinks at the edges.
pub fn median_filter_bool(xs: &[bool], window: usize) -> Vec<bool> {
    if window <= 1 || xs.len() <= 1 {
        return xs.to_vec();
    }
    let r = window / 2;
    let n = xs.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(r);
            let hi = (i + r + 1).min(n);
            let trues = xs[lo..hi].iter().filter(|&&v| v).count();
            trues * 2 > hi - lo
        })
        .collect()
}

/// Median over a centered window; the window shrinks at the edges.
pub fn median_filter_f32(xs: &[f32], window: usize) -> Vec<f32> {
    if window <= 1 || xs.len() <= 1 {
        return xs.to_vec();
    }
    let r = window / 2;
    let n = xs.len();
    let mut buf = Vec::with_capacity(window);
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(r);
            let hi = (i + r + 1).min(n);
            buf.clear();
            buf.extend_from_slice(&xs[lo..hi]);
            buf.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            buf[buf.len() / 2]
        })
        .collect()
}

/// True only where the whole centered window is true. Out-of-range
/// neighbors count as false, so runs shrink at the array edges too.
pub fn erode_runs(xs: &[bool], width: usize) -> Vec<bool> {
    if width <= 1 {
        return xs.to_vec();
    }
    let r = width / 2;
    let n = xs.len();
    (0..n)
        .map(|i| {
            if i < r || i + r >= n {
                return false;
            }
            xs[i - r..=i + r].iter().all(|&v| v)
        })
        .collect()
}

/// True where any element of the centered window is true.
pub fn dilate_runs(xs: &[bool], width: usize) -> Vec<bool> {
    if width <= 1 {
        return xs.to_vec();
    }
    let r = width / 2;
    let n = xs.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(r);
            let hi = (i + r + 1).min(n);
            xs[lo..hi].iter().any(|&v| v)
        })
        .collect()
}

/// Erode then dilate with the same width: runs shorter than `width`
/// vanish, longer interior runs come back at full length.
pub fn open_runs(xs: &[bool], width: usize) -> Vec<bool> {
    dilate_runs(&erode_runs(xs, width), width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn odd_window_rounds_up_to_odd() {
        assert_eq!(odd_window(0.5, 25.0), 13);
        assert_eq!(odd_window(0.2, 25.0), 5);
        assert_eq!(odd_window(0.0, 25.0), 1);
        assert_eq!(odd_window(0.16, 25.0), 5);
    }

    #[test]
    fn median_bool_removes_single_frame_noise() {
        let noisy = bits("0001011101000");
        let cleaned = median_filter_bool(&noisy, 3);
        assert_eq!(cleaned, bits("0000111110000"));
    }

    #[test]
    fn median_f32_rejects_outliers() {
        let xs = [1.0, 1.0, 100.0, 1.0, 1.0];
        let m = median_filter_f32(&xs, 3);
        assert_eq!(m[2], 1.0);
    }

    #[test]
    fn open_drops_short_runs_and_keeps_long_ones() {
        //                 short     long
        let xs = bits("00110000111111110000");
        let opened = open_runs(&xs, 5);
        assert_eq!(opened, bits("00000000111111110000"));
    }

    #[test]
    fn open_preserves_run_at_least_as_long_as_width() {
        let mut xs = vec![false; 40];
        for f in 10..20 {
            xs[f] = true; // 10-frame bout
        }
        let opened = open_runs(&xs, 9);
        let count = opened.iter().filter(|&&v| v).count();
        assert_eq!(count, 10, "bout longer than the window survives intact");
    }

    #[test]
    fn erode_respects_edges() {
        let xs = bits("1110000");
        assert_eq!(erode_runs(&xs, 3), bits("0100000"));
    }
}
