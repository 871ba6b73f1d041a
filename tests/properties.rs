//! Property-based tests for slot generation, availability, overlap and pricing.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use ulid::Ulid;

use chauffeur::engine::{
    PricingConfig, RouteCache, WeeklyTemplate, generate_slots, has_conflict, quote, resolve_free_slots, round_up,
};
use chauffeur::model::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Any date in 2025-2027.
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..3 * 365).prop_map(|offset| NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(offset))
}

fn arb_time() -> impl Strategy<Value = TimeOfDay> {
    (0i64..24 * 60).prop_map(|m| TimeOfDay::from_minutes(m).unwrap())
}

fn arb_duration() -> impl Strategy<Value = u32> {
    1u32..=300
}

fn arb_service() -> impl Strategy<Value = ServiceType> {
    prop_oneof![
        Just(ServiceType::Transfer),
        Just(ServiceType::Airport),
        Just(ServiceType::Hourly),
        Just(ServiceType::Event),
    ]
}

/// Busy bookings starting on the day before, the day of, or the day after.
fn arb_busy(date: NaiveDate) -> impl Strategy<Value = Vec<BusyRecord>> {
    prop::collection::vec((-1i64..=1, arb_time(), arb_duration()), 0..8).prop_map(move |items| {
        items
            .into_iter()
            .map(|(day, start, duration_minutes)| BusyRecord::NormalBooking {
                id: Ulid::new(),
                start: start.on(date + Duration::days(day)),
                duration_minutes,
            })
            .collect()
    })
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn slots_strictly_ascending(date in arb_date()) {
        let slots = generate_slots(date, &WeeklyTemplate::default());
        prop_assert!(!slots.is_empty());
        for pair in slots.windows(2) {
            prop_assert!(pair[0] < pair[1], "not ascending: {} then {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn night_window_every_day(date in arb_date()) {
        let slots = generate_slots(date, &WeeklyTemplate::default());
        for m in (0..=390).step_by(30) {
            prop_assert!(slots.contains(&TimeOfDay::from_minutes(m).unwrap()));
        }
    }
}

// ---------------------------------------------------------------------------
// Availability: template minus exactly the overlapping slots
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn free_slots_are_template_minus_overlaps(
        (date, busy) in arb_date().prop_flat_map(|d| (Just(d), arb_busy(d))),
        duration in arb_duration(),
    ) {
        let template = WeeklyTemplate::default();
        let free = resolve_free_slots(date, duration, &busy, &template);

        let expected: Vec<TimeOfDay> = generate_slots(date, &template)
            .into_iter()
            .filter(|slot| {
                let candidate = Span::starting_at(slot.on(date), duration);
                !busy.iter().any(|b| b.span().overlaps(&candidate))
            })
            .collect();
        prop_assert_eq!(free, expected);
    }

    #[test]
    fn no_free_slot_conflicts(
        (date, busy) in arb_date().prop_flat_map(|d| (Just(d), arb_busy(d))),
        duration in arb_duration(),
    ) {
        for slot in resolve_free_slots(date, duration, &busy, &WeeklyTemplate::default()) {
            let span = Span::starting_at(slot.on(date), duration);
            prop_assert!(!has_conflict(&span, &busy, None));
        }
    }
}

// ---------------------------------------------------------------------------
// Overlap
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn overlap_is_symmetric(
        date in arb_date(),
        a in arb_time(), la in arb_duration(),
        b in arb_time(), lb in arb_duration(),
    ) {
        let x = Span::starting_at(a.on(date), la);
        let y = Span::starting_at(b.on(date), lb);
        prop_assert_eq!(x.overlaps(&y), y.overlaps(&x));
    }

    #[test]
    fn touching_spans_do_not_overlap(date in arb_date(), a in arb_time(), la in arb_duration(), lb in arb_duration()) {
        let x = Span::starting_at(a.on(date), la);
        let y = Span::starting_at(x.end, lb);
        prop_assert!(!x.overlaps(&y));
        let z = Span::starting_at(x.end - Duration::minutes(1), lb);
        prop_assert!(x.overlaps(&z));
    }
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn price_never_drops_with_distance(
        d1 in 0.0f64..200.0,
        extra in 0.0f64..50.0,
        date in arb_date(),
        time in arb_time(),
        service in arb_service(),
        stops in 0u32..5,
        pets in any::<bool>(),
    ) {
        let c = PricingConfig::default();
        let near = quote(d1, time, date, service, stops, pets, &c).total;
        let far = quote(d1 + extra, time, date, service, stops, pets, &c).total;
        prop_assert!(near <= far, "{d1} km -> {near}, {} km -> {far}", d1 + extra);
    }

    #[test]
    fn stops_never_lower_the_price(
        d in 0.0f64..200.0,
        date in arb_date(),
        time in arb_time(),
        stops in 0u32..5,
    ) {
        let c = PricingConfig::default();
        let fewer = quote(d, time, date, ServiceType::Transfer, stops, false, &c).total;
        let more = quote(d, time, date, ServiceType::Transfer, stops + 1, false, &c).total;
        prop_assert!(fewer <= more);
    }

    #[test]
    fn surcharge_applies_at_most_once(
        d in 0.0f64..200.0,
        date in arb_date(),
        time in arb_time(),
        stops in 0u32..5,
    ) {
        let c = PricingConfig::default();
        let p = quote(d, time, date, ServiceType::Transfer, stops, false, &c);
        let subtotal = p.base_fare + p.distance_fare + p.stop_fee;
        prop_assert!(p.night_surcharge == 0.0 || (p.night_surcharge - subtotal * 0.2).abs() < 1e-9);
    }

    #[test]
    fn totals_are_rounded_up_to_five(
        d in 0.0f64..200.0,
        date in arb_date(),
        time in arb_time(),
        service in arb_service(),
        pets in any::<bool>(),
    ) {
        let c = PricingConfig::default();
        let p = quote(d, time, date, service, 0, pets, &c);
        prop_assert_eq!(p.total % 5.0, 0.0);
        let raw = (p.base_fare + p.distance_fare + p.stop_fee + p.night_surcharge) * p.service_multiplier + p.pet_fee;
        prop_assert!(p.total + 0.005 + 1e-9 >= raw);
        prop_assert!(p.total < raw + 5.0 + 0.01);
    }

    #[test]
    fn round_up_is_idempotent(x in 0.0f64..10_000.0) {
        let once = round_up(x, 5.0);
        prop_assert_eq!(round_up(once, 5.0), once);
    }
}

// ---------------------------------------------------------------------------
// Route cache
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn cache_honours_freshness_window(
        origin in "[A-Za-z ]{1,20}",
        destination in "[A-Za-z ]{1,20}",
        age_secs in 0i64..200_000,
    ) {
        let cache = RouteCache::new(Duration::hours(24));
        let route = RouteInfo { distance_km: 10.0, duration_min: 15, traffic: TrafficLevel::Low, toll: false };
        let t0 = chrono::Utc::now();
        cache.put_at(&origin, &destination, route.clone(), t0);

        let hit = cache.get_at(&origin, &destination, t0 + Duration::seconds(age_secs));
        if age_secs <= 24 * 3600 {
            prop_assert_eq!(hit.map(|e| e.route), Some(route));
        } else {
            prop_assert!(hit.is_none());
            prop_assert!(cache.is_empty());
        }
    }
}
