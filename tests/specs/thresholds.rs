//! Threshold parser round-trip guarantees.

use pcs_core::Threshold;

#[test]
fn every_canonical_form_round_trips() {
    for canonical in ["20%", "0%", "100%", "50GiB", "512MiB", "50GB", "100MB"] {
        let parsed: Threshold = canonical.parse().unwrap();
        assert_eq!(parsed.to_string(), canonical, "round trip for {canonical}");
    }
}

#[test]
fn bare_numbers_are_rejected() {
    for bad in ["20", "1.5", "-3", "20KB", "20kib"] {
        assert!(bad.parse::<Threshold>().is_err(), "{bad} must be rejected");
    }
}
