use super::*;

fn fps(num: u32, den: u32) -> Fps {
    Fps::new(num, den).unwrap()
}

#[test]
fn three_slide_deck_sums_to_total_audio() {
    let t = Timeline::build(&[2.0, 5.5, 3.2], fps(24, 1)).unwrap();
    assert_eq!(t.len(), 3);

    let frames: Vec<(u64, u64)> = t
        .entries()
        .iter()
        .map(|e| (e.frames.start.0, e.frames.end.0))
        .collect();
    assert_eq!(frames, vec![(0, 48), (48, 180), (180, 257)]);
    assert_eq!(t.total_frames(), 257);
    assert!((t.total_secs() - 10.7).abs() <= 0.5 / 24.0);
    assert_eq!(
        t.entries().iter().map(|e| e.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn spans_are_contiguous_and_each_within_one_frame_of_its_audio() {
    let durations = [1.01, 0.37, 2.999, 4.2, 0.5, 7.77, 3.333];
    for rate in [fps(24, 1), fps(25, 1), fps(30000, 1001), fps(60, 1)] {
        let t = Timeline::build(&durations, rate).unwrap();
        let frame = rate.frame_duration_secs();
        let mut expected_start = 0;
        for (entry, &secs) in t.entries().iter().zip(&durations) {
            assert_eq!(entry.frames.start.0, expected_start);
            expected_start = entry.frames.end.0;
            assert!(
                (entry.span_secs(rate) - secs).abs() <= frame + 1e-9,
                "span {} vs audio {secs} at {rate:?}",
                entry.span_secs(rate)
            );
        }
    }
}

#[test]
fn rounding_error_does_not_accumulate() {
    // 0.05s at 24 fps is 1.2 frames; rounding each segment alone would lose 0.2 frames apiece.
    let durations = vec![0.05; 400];
    let t = Timeline::build(&durations, fps(24, 1)).unwrap();
    let true_total = 0.05 * 400.0;
    assert!((t.total_secs() - true_total).abs() <= 0.5 / 24.0 + 1e-9);
}

#[test]
fn start_seconds_follow_frame_starts() {
    let rate = fps(24, 1);
    let t = Timeline::build(&[2.0, 1.0], rate).unwrap();
    assert!((t.entries()[1].start_secs(rate) - 2.0).abs() < 1e-9);
}

#[test]
fn empty_and_degenerate_durations_are_rejected() {
    assert!(Timeline::build(&[], fps(24, 1)).is_err());

    let err = Timeline::build(&[1.0, 0.0], fps(24, 1)).unwrap_err();
    assert_eq!(err.slide_index(), Some(1));

    assert!(Timeline::build(&[f64::NAN], fps(24, 1)).is_err());

    // 10ms is a quarter of a frame at 24 fps.
    let err = Timeline::build(&[0.01], fps(24, 1)).unwrap_err();
    assert_eq!(err.slide_index(), Some(0));
}

#[test]
fn short_tracks_are_judged_on_their_own_length() {
    let rate = fps(24, 1);
    // 15ms is under half a frame wherever it lands in the deck.
    for deck in [[1.0, 0.015], [1.015, 0.015], [0.5, 0.015]] {
        let err = Timeline::build(&deck, rate).unwrap_err();
        assert_eq!(err.slide_index(), Some(1), "{deck:?}");
    }
    // 25ms is just over half a frame and is accepted after any predecessor.
    for deck in [[1.0, 0.025], [1.015, 0.025], [0.5, 0.025]] {
        let t = Timeline::build(&deck, rate).unwrap();
        assert!(t.entries()[1].frame_count() >= 1, "{deck:?}");
    }
}

#[test]
fn accepted_track_that_rounds_to_nothing_still_gets_a_frame() {
    let rate = fps(10, 1);
    // 0.25s ends on 2.5 frames and rounds up to 3; 0.06s more ends on 3.1, which rounds
    // back to 3.
    let t = Timeline::build(&[0.25, 0.06, 1.0], rate).unwrap();
    let frames: Vec<(u64, u64)> = t
        .entries()
        .iter()
        .map(|e| (e.frames.start.0, e.frames.end.0))
        .collect();
    assert_eq!(frames, vec![(0, 3), (3, 4), (4, 13)]);
    assert_eq!(t.total_frames(), 13);
}
