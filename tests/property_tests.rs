//! Property-based tests using proptest.
//! Invariants of the row parser and the placeholder data generator.

use mobility_dashboard_api::import_schema::{parse_record, TRIP_COLUMNS};
use mobility_dashboard_api::sync::mock_trips;
use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::HashSet;

fn record_from(fields: Vec<String>) -> csv::StringRecord {
    csv::StringRecord::from(fields)
}

// Property: the row parser should never panic, whatever the input
proptest! {
    #[test]
    fn parse_record_never_panics(fields in prop::collection::vec("\\PC*", 0..12)) {
        let record = record_from(fields);
        let _ = parse_record(&record, 1);
    }

    #[test]
    fn wrong_column_count_always_fails(fields in prop::collection::vec("[a-z0-9]{0,8}", 0..12)) {
        prop_assume!(fields.len() != TRIP_COLUMNS.len());
        let record = record_from(fields);
        prop_assert!(parse_record(&record, 1).is_err());
    }
}

// Property: rows built to the declared contract always parse and round-trip
proptest! {
    #[test]
    fn contract_rows_always_parse(
        id in "[a-z0-9]{1,12}",
        codigo in "[0-9]{7}",
        year in 2015i32..2030,
        month in 1u32..=12,
        day in 1u32..=28,
        distancia_dm in 0u32..5000,
        cents in 0u32..100_000,
    ) {
        let distancia = distancia_dm as f64 / 10.0;
        let valor = format!("{}.{:02}", cents / 100, cents % 100);
        let date = format!("{:04}-{:02}-{:02}", year, month, day);
        let record = record_from(vec![
            id.clone(),
            codigo.clone(),
            "Cidade Teste".to_string(),
            "Origem".to_string(),
            "Destino".to_string(),
            date,
            format!("{:.1}", distancia),
            valor.clone(),
        ]);

        let trip = parse_record(&record, 1).unwrap();
        prop_assert_eq!(trip.external_id, id);
        prop_assert_eq!(trip.municipio_codigo, codigo);
        prop_assert_eq!(trip.distancia_km, distancia);
        prop_assert_eq!(trip.valor.to_string(), valor);
        prop_assert_eq!(
            trip.started_at.date_naive(),
            NaiveDate::from_ymd_opt(year, month, day).unwrap()
        );
    }

    #[test]
    fn empty_external_id_never_parses(
        codigo in "[0-9]{7}",
        padding in " {0,3}",
    ) {
        let record = record_from(vec![
            padding.to_string(),
            codigo,
            "Cidade".to_string(),
            "A".to_string(),
            "B".to_string(),
            "2024-03-01".to_string(),
            "2.0".to_string(),
            "10.00".to_string(),
        ]);
        prop_assert!(parse_record(&record, 1).is_err());
    }
}

// Property: placeholder generation is deterministic and collision-free
proptest! {
    #[test]
    fn mock_trips_deterministic(
        year in 2015i32..2030,
        month in 1u32..=12,
        day in 1u32..=28,
        days in 1u32..=60,
    ) {
        let end_day = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        let first = mock_trips(end_day, days);
        let second = mock_trips(end_day, days);
        prop_assert_eq!(&first, &second);
        prop_assert!(!first.is_empty());
    }

    #[test]
    fn mock_trip_ids_never_collide(
        year in 2015i32..2030,
        month in 1u32..=12,
        day in 1u32..=28,
        days in 1u32..=60,
    ) {
        let end_day = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        let trips = mock_trips(end_day, days);
        let ids: HashSet<_> = trips.iter().map(|t| t.external_id.clone()).collect();
        prop_assert_eq!(ids.len(), trips.len());
    }

    #[test]
    fn mock_trips_have_sane_values(
        year in 2015i32..2030,
        month in 1u32..=12,
        day in 1u32..=28,
    ) {
        let end_day = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        for trip in mock_trips(end_day, 7) {
            prop_assert!(trip.distancia_km >= 0.0);
            prop_assert!(trip.valor.to_string().parse::<f64>().unwrap() >= 0.0);
            prop_assert!(trip.started_at.date_naive() <= end_day);
        }
    }
}
