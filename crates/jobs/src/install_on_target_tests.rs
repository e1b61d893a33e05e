// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_util::{drain_events, fixture, JobFixture};
use serde_json::json;

fn source_version() -> ToolVersion {
    ToolVersion::current().unwrap()
}

fn gate(fx: &JobFixture) -> InstallOnTargetJob {
    InstallOnTargetJob::new(fx.ctx.clone(), CancellationToken::new())
}

fn ls_remote_output(tags: &[&str]) -> String {
    tags.iter()
        .map(|t| format!("0000000000000000000000000000000000000000\trefs/tags/{t}\n"))
        .collect()
}

#[tokio::test]
async fn equal_versions_are_a_noop() {
    let fx = fixture(InstallOnTargetJob::NAME, json!({}));
    fx.target.respond(
        "pc-switcher --version",
        0,
        &format!("pc-switcher {}\n", source_version()),
        "",
    );

    let job = gate(&fx);
    assert!(job.validate().await.is_empty());
    assert_eq!(job.decision(), Some(GateDecision::UpToDate));

    job.sync().await.unwrap();
    assert!(!fx.target.ran_matching("curl"));
}

#[tokio::test]
async fn newer_target_fails_validation() {
    let fx = fixture(InstallOnTargetJob::NAME, json!({}));
    fx.target
        .respond("pc-switcher --version", 0, "pc-switcher 99.0.0\n", "");

    let job = gate(&fx);
    let errors = job.validate().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        format!(
            "Target version 99.0.0 is newer than source {}",
            source_version()
        )
    );
    assert!(job.decision().is_none());
}

#[tokio::test]
async fn absent_target_is_installed_and_verified() {
    let fx = fixture(InstallOnTargetJob::NAME, json!({}));
    let version = source_version();
    // Probe during validate: not installed. Probe after install: current.
    fx.target
        .respond("pc-switcher --version", 127, "", "command not found");
    fx.target.respond(
        "pc-switcher --version",
        0,
        &format!("pc-switcher {version}\n"),
        "",
    );
    fx.target.respond(
        "git ls-remote",
        0,
        &ls_remote_output(&["v0.1.0", &version.tag()]),
        "",
    );

    let job = gate(&fx);
    assert!(job.validate().await.is_empty());
    assert_eq!(job.decision(), Some(GateDecision::Install(version.clone())));

    job.sync().await.unwrap();
    assert!(fx.target.ran_matching(&format!(
        "raw.githubusercontent.com/flaksit/pc-switcher/{}/install.sh",
        version.tag()
    )));
}

#[tokio::test]
async fn older_target_is_upgraded() {
    let fx = fixture(InstallOnTargetJob::NAME, json!({}));
    let version = source_version();
    fx.target
        .respond("pc-switcher --version", 0, "pc-switcher 0.1.0\n", "");
    fx.target.respond(
        "pc-switcher --version",
        0,
        &format!("pc-switcher {version}\n"),
        "",
    );
    fx.target
        .respond("git ls-remote", 0, &ls_remote_output(&[&version.tag()]), "");

    let job = gate(&fx);
    assert!(job.validate().await.is_empty());
    assert!(matches!(job.decision(), Some(GateDecision::Upgrade { .. })));
    job.sync().await.unwrap();
    assert!(fx.target.ran_matching("install.sh"));
}

#[tokio::test]
async fn unpublished_tag_falls_back_to_greatest_published_release() {
    let fx = fixture(InstallOnTargetJob::NAME, json!({}));
    fx.target
        .respond("pc-switcher --version", 127, "", "command not found");
    fx.target
        .respond("pc-switcher --version", 0, "pc-switcher 0.2.0\n", "");
    // Source tag missing from the published set
    fx.target.respond(
        "git ls-remote",
        0,
        &ls_remote_output(&["v0.1.0", "v0.2.0", "v99.0.0"]),
        "",
    );

    let job = gate(&fx);
    job.validate().await;
    job.sync().await.unwrap();
    assert!(fx.target.ran_matching("/v0.2.0/install.sh"));
}

#[tokio::test]
async fn no_usable_release_fails_the_install() {
    let fx = fixture(InstallOnTargetJob::NAME, json!({}));
    fx.target
        .respond("pc-switcher --version", 127, "", "command not found");
    fx.target
        .respond("git ls-remote", 0, &ls_remote_output(&["v99.0.0"]), "");

    let job = gate(&fx);
    job.validate().await;
    let err = job.sync().await.unwrap_err();
    assert!(err.to_string().contains("no published release"));
}

#[tokio::test]
async fn failed_verification_is_an_error() {
    let fx = fixture(InstallOnTargetJob::NAME, json!({}));
    let version = source_version();
    fx.target
        .respond("pc-switcher --version", 127, "", "command not found");
    fx.target
        .respond("pc-switcher --version", 0, "pc-switcher 0.0.1\n", "");
    fx.target
        .respond("git ls-remote", 0, &ls_remote_output(&[&version.tag()]), "");

    let job = gate(&fx);
    job.validate().await;
    let err = job.sync().await.unwrap_err();
    assert!(err.to_string().contains("verification failed"));
}

#[tokio::test]
async fn dry_run_logs_instead_of_installing() {
    let mut fx = fixture(InstallOnTargetJob::NAME, json!({}));
    fx.ctx.dry_run = true;
    let version = source_version();
    fx.target
        .respond("pc-switcher --version", 127, "", "command not found");
    fx.target
        .respond("git ls-remote", 0, &ls_remote_output(&[&version.tag()]), "");

    let job = InstallOnTargetJob::new(fx.ctx.clone(), CancellationToken::new());
    job.validate().await;
    job.sync().await.unwrap();

    assert!(!fx.target.ran_matching("curl"));
    let (logs, _) = drain_events(&mut fx.events);
    assert!(logs.iter().any(|(_, m)| m.contains("[dry-run]")));
}

#[tokio::test]
async fn ls_remote_parsing_skips_peeled_and_invalid_refs() {
    let fx = fixture(InstallOnTargetJob::NAME, json!({}));
    fx.target.respond(
        "git ls-remote",
        0,
        "abc\trefs/tags/v0.1.0\nabc\trefs/tags/v0.1.0^{}\nabc\trefs/tags/nightly\n",
        "",
    );
    let job = gate(&fx);
    let versions = job.published_versions("flaksit/pc-switcher").await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].to_string(), "0.1.0");
}
