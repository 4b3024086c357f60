// --- File: crates/calprobe_ews/src/view_proptest.rs ---
use crate::mock::apply_view;
use calprobe_common::models::CalendarView;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

prop_compose! {
    fn arb_starts()(offsets in prop::collection::vec(-5000i64..5000, 0..64)) -> Vec<DateTime<Utc>> {
        offsets.into_iter().map(|m| base() + Duration::minutes(m)).collect()
    }
}

proptest! {
    #[test]
    fn results_are_windowed_sorted_and_capped(
        starts in arb_starts(),
        window_start in -3000i64..3000,
        window_len in 1i64..4000,
        limit in 0usize..48,
    ) {
        let view = CalendarView::new(
            base() + Duration::minutes(window_start),
            base() + Duration::minutes(window_start + window_len),
            limit,
        );

        let kept = apply_view(starts.clone(), &view, |s| *s);

        prop_assert!(kept.len() <= limit);
        prop_assert!(kept.iter().all(|s| view.contains(*s)));
        prop_assert!(kept.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn nothing_in_window_is_dropped_below_the_limit(starts in arb_starts()) {
        let view = CalendarView::new(
            base() - Duration::minutes(5000),
            base() + Duration::minutes(5000),
            usize::MAX,
        );
        let kept = apply_view(starts.clone(), &view, |s| *s);
        // The window covers every generated start, so only ordering changes.
        prop_assert_eq!(kept.len(), starts.len());
    }
}
