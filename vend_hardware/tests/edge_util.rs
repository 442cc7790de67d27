use rstest::rstest;
use vend_hardware::util::{FallingEdge, count_falling_edges};

#[rstest]
#[case(&[true, false, true, false], 2)]
#[case(&[false, false, true, true], 0)]
#[case(&[true, true, true], 0)]
#[case(&[false, true, false, false, true, false], 2)]
#[case(&[], 0)]
fn counts_only_high_to_low(#[case] samples: &[bool], #[case] expected: usize) {
    assert_eq!(count_falling_edges(samples.iter().copied()), expected);
}

#[test]
fn first_sample_low_is_not_a_pulse() {
    let mut det = FallingEdge::new();
    assert!(!det.update(false));
    assert!(!det.update(true));
    assert!(det.update(false));
}

#[test]
fn reset_discards_history() {
    let mut det = FallingEdge::new();
    det.update(true);
    det.reset();
    assert!(!det.update(false));
}
