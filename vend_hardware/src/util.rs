/// Falling-edge detector for a pulled-up input.
///
/// The line rests high; a pulse is the transition from high to low. The
/// first sample only primes the detector and never counts as an edge.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallingEdge {
    last: Option<bool>,
}

impl FallingEdge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample; returns true when it completes a high→low transition.
    #[inline]
    pub fn update(&mut self, high: bool) -> bool {
        let edge = matches!(self.last, Some(true)) && !high;
        self.last = Some(high);
        edge
    }

    /// Forget the previous sample (e.g. after a read error).
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Count falling edges in a sequence of samples.
pub fn count_falling_edges(samples: impl IntoIterator<Item = bool>) -> usize {
    let mut det = FallingEdge::new();
    samples.into_iter().filter(|&s| det.update(s)).count()
}
