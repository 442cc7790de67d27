//! Common progress and period helpers for vend_core.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Segments in the front-panel progress bar.
pub const PROGRESS_SEGMENTS: usize = 18;

/// Percent of `target` reached by `pulses`, floored and capped at 100.
/// A zero target counts as complete.
#[inline]
pub fn progress_percent(pulses: u32, target: u32) -> u8 {
    if target == 0 {
        return 100;
    }
    let pct = u64::from(pulses) * 100 / u64::from(target);
    pct.min(100) as u8
}

/// Number of ticks needed to reach `target` at `step` pulses per tick (ceiling).
#[inline]
pub fn ticks_to_target(target: u32, step: u32) -> u32 {
    target.div_ceil(step.max(1))
}

/// Render `percent` as a segment bar: `█` for filled, `▬` for empty.
pub fn render_progress_bar(percent: u8, segments: usize) -> String {
    let filled = usize::from(percent.min(100)) * segments / 100;
    let mut s = String::with_capacity(segments * 3);
    s.extend(std::iter::repeat_n('█', filled));
    s.extend(std::iter::repeat_n('▬', segments - filled));
    s
}
