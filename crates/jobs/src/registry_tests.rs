// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_util::fixture;
use yare::parameterized;

#[parameterized(
    install = { "install_on_target" },
    disk = { "disk_space_monitor" },
    dummy_success = { "dummy_success" },
    dummy_fail = { "dummy_fail" },
)]
fn builtin_jobs_are_known(name: &str) {
    assert!(is_known_job(name));
}

#[test]
fn unknown_names_are_rejected() {
    assert!(!is_known_job("make_coffee"));
}

#[test]
fn create_job_constructs_by_name() {
    let fx = fixture("dummy_success", serde_json::json!({}));
    let job = create_job("dummy_success", fx.ctx, CancellationToken::new()).unwrap();
    assert_eq!(job.name(), "dummy_success");
    assert!(!job.required());
}

#[test]
fn create_job_returns_none_for_unknown() {
    let fx = fixture("nope", serde_json::json!({}));
    assert!(create_job("nope", fx.ctx, CancellationToken::new()).is_none());
}

#[test]
fn names_in_table_match_job_names() {
    for (name, constructor) in BUILTIN_JOBS {
        let fx = fixture(name, serde_json::json!({}));
        let job = constructor(fx.ctx, CancellationToken::new());
        assert_eq!(job.name(), *name);
    }
}

#[test]
fn every_job_exposes_a_schema() {
    for (name, constructor) in BUILTIN_JOBS {
        let fx = fixture(name, serde_json::json!({}));
        let job = constructor(fx.ctx, CancellationToken::new());
        let schema = serde_json::to_value(job.config_schema()).unwrap();
        assert!(schema.is_object(), "{name} schema must serialize");
    }
}
