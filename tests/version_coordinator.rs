mod common;

use common::{Fixture, repo};
use mpr::error::{ConfigError, MprError, TestError};
use mpr::manifest::{LockMode, Requirement};
use mpr::testing::{TestOutcome, TestSuite};
use mpr::version::{BumpRequest, CascadeOutcome};
use mpr::{VersionBump, VersionCoordinator};

fn chain() -> Fixture {
    Fixture::new(&[
        repo("a", "1.0.0", &[]),
        repo("b", "1.0.0", &["a"]),
        repo("c", "1.0.0", &["b"]),
    ])
}

#[tokio::test]
async fn major_bump_cascades_alpha_versions_down_the_chain() {
    let fx = chain();
    let (ports, handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let report = coordinator
        .bump_repository(BumpRequest::new("a", VersionBump::Major))
        .await
        .unwrap();

    assert_eq!(report.old_version, "1.0.0");
    assert_eq!(report.new_version, "2.0.0");
    assert_eq!(fx.version_of("a"), "2.0.0");
    assert_eq!(fx.version_of("b"), "1.0.1-alpha.1");
    assert_eq!(fx.version_of("c"), "1.0.1-alpha.1");
    assert_eq!(
        fx.requirement("b", "a"),
        Some(Requirement::Range("^2.0.0".to_string()))
    );
    assert_eq!(
        fx.requirement("c", "b"),
        Some(Requirement::Range("^1.0.1-alpha.1".to_string()))
    );
    assert_eq!(
        report.bumped_dependents(),
        vec![("b", "1.0.1-alpha.1"), ("c", "1.0.1-alpha.1")]
    );

    let locks = handles.manifest.lock().unwrap().locks.clone();
    assert!(locks.contains(&("b".to_string(), LockMode::Fast)));
    assert!(locks.contains(&("c".to_string(), LockMode::Fast)));

    // Bumps leave committing to the caller
    assert!(handles.vcs.commit_messages("b").is_empty());

    let validated: Vec<&str> = report.validation.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(validated, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn diamond_dependent_is_bumped_once_with_both_requirements() {
    let fx = Fixture::new(&[
        repo("base", "1.0.0", &[]),
        repo("left", "1.0.0", &["base"]),
        repo("right", "2.0.0", &["base"]),
        repo("top", "0.3.0", &["left", "right"]),
    ]);
    let (ports, _handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let mut request = BumpRequest::new("base", VersionBump::Minor);
    request.validate = false;
    let report = coordinator.bump_repository(request).await.unwrap();

    let top_steps: Vec<_> = report
        .dependents
        .iter()
        .filter(|s| s.repository == "top")
        .collect();
    assert_eq!(top_steps.len(), 1);
    assert_eq!(top_steps[0].updated.len(), 2);
    assert_eq!(report.dependents.last().unwrap().repository, "top");

    assert_eq!(fx.version_of("base"), "1.1.0");
    assert_eq!(fx.version_of("right"), "2.0.1-alpha.1");
    assert_eq!(fx.version_of("top"), "0.3.1-alpha.1");
    assert_eq!(
        fx.requirement("top", "right"),
        Some(Requirement::Range("^2.0.1-alpha.1".to_string()))
    );
}

#[tokio::test]
async fn dry_run_reports_without_touching_anything() {
    let fx = chain();
    let before: Vec<String> = ["a", "b", "c"].iter().map(|n| fx.manifest_text(n)).collect();
    let (ports, handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let mut request = BumpRequest::new("a", VersionBump::Minor);
    request.dry_run = true;
    let report = coordinator.bump_repository(request).await.unwrap();

    assert_eq!(report.new_version, "1.1.0");
    assert_eq!(
        report.bumped_dependents(),
        vec![("b", "1.0.1-alpha.1"), ("c", "1.0.1-alpha.1")]
    );
    let after: Vec<String> = ["a", "b", "c"].iter().map(|n| fx.manifest_text(n)).collect();
    assert_eq!(before, after);
    assert!(handles.manifest.lock().unwrap().locks.is_empty());
    assert!(handles.tests.runs().is_empty());
    assert!(coordinator.history().entries().unwrap().is_empty());
}

#[tokio::test]
async fn alpha_bump_advances_the_counter_and_is_recorded() {
    let fx = Fixture::new(&[repo("a", "1.2.0-alpha.2", &[])]);
    let (ports, _handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let mut request = BumpRequest::new("a", VersionBump::Minor);
    request.alpha = true;
    let report = coordinator.bump_repository(request).await.unwrap();
    assert_eq!(report.new_version, "1.2.0-alpha.3");

    let entries = coordinator.history().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].repository, "a");
    assert_eq!(entries[0].old_version, "1.2.0-alpha.2");
    assert!(entries[0].is_alpha);
}

#[tokio::test]
async fn failing_validation_surfaces_the_repository() {
    let fx = chain();
    let (ports, handles) = fx.ports();
    handles.tests.script(
        "b",
        TestSuite::Unit,
        TestOutcome::Failed {
            output: "1 failed".to_string(),
        },
    );
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let err = coordinator
        .bump_repository(BumpRequest::new("a", VersionBump::Patch))
        .await
        .unwrap_err();

    match err {
        MprError::Test(TestError::Failed { repository, .. }) => assert_eq!(repository, "b"),
        other => panic!("unexpected error: {other}"),
    }
    // The bump itself stays written
    assert_eq!(fx.version_of("a"), "1.0.1");
}

#[tokio::test]
async fn cyclic_workspace_fails_before_any_write() {
    let fx = Fixture::new(&[repo("a", "1.0.0", &["b"]), repo("b", "1.0.0", &["a"])]);
    let before = fx.manifest_text("a");
    let (ports, _handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let err = coordinator
        .bump_repository(BumpRequest::new("a", VersionBump::Patch))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MprError::Config(ConfigError::CircularDependency { .. })
    ));
    assert_eq!(fx.manifest_text("a"), before);
}

#[tokio::test]
async fn unknown_repository_is_a_configuration_error() {
    let fx = chain();
    let (ports, _handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let err = coordinator
        .bump_repository(BumpRequest::new("nope", VersionBump::Patch))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MprError::Config(ConfigError::RepositoryNotFound { .. })
    ));
}

#[tokio::test]
async fn without_dependents_only_the_target_moves() {
    let fx = chain();
    let before_b = fx.manifest_text("b");
    let (ports, _handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let mut request = BumpRequest::new("a", VersionBump::Patch);
    request.update_dependents = false;
    request.validate = false;
    let report = coordinator.bump_repository(request).await.unwrap();

    assert!(report.dependents.is_empty());
    assert_eq!(fx.version_of("a"), "1.0.1");
    assert_eq!(fx.manifest_text("b"), before_b);
}

#[tokio::test]
async fn dependent_without_declared_requirement_is_skipped() {
    let fx = chain();
    // Drop b's requirement on a from the manifest while keeping the workspace edge
    let path = fx.descriptor("b").path.join("pyproject.toml");
    let text = fx.manifest_text("b").replace("a = \"^1.0.0\"\n", "");
    std::fs::write(&path, text).unwrap();

    let (ports, _handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);
    let mut request = BumpRequest::new("a", VersionBump::Patch);
    request.validate = false;
    let report = coordinator.bump_repository(request).await.unwrap();

    let b = report
        .dependents
        .iter()
        .find(|s| s.repository == "b")
        .unwrap();
    assert!(matches!(b.outcome, CascadeOutcome::Skipped { .. }));
    assert_eq!(fx.version_of("b"), "1.0.0");
}

#[test]
fn sync_rewrites_stale_requirements_after_confirmation() {
    let fx = chain();
    let a_manifest = fx.descriptor("a").path.join("pyproject.toml");
    let text = fx.manifest_text("a").replace("version = \"1.0.0\"", "version = \"1.3.0\"");
    std::fs::write(&a_manifest, text).unwrap();

    let (ports, _handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let preview = coordinator
        .sync_dependency_versions(true, false, |_| panic!("dry run must not ask"))
        .unwrap();
    assert_eq!(preview.mismatches.len(), 1);
    assert_eq!(preview.mismatches[0].repository, "b");
    assert_eq!(preview.mismatches[0].new_requirement(), "^1.3.0");
    assert_eq!(
        fx.requirement("b", "a"),
        Some(Requirement::Range("^1.0.0".to_string()))
    );

    let declined = coordinator
        .sync_dependency_versions(false, false, |_| false)
        .unwrap();
    assert!(declined.cancelled);
    assert!(!declined.success());

    let applied = coordinator
        .sync_dependency_versions(false, false, |mismatches| mismatches.len() == 1)
        .unwrap();
    assert!(applied.success());
    assert_eq!(
        fx.requirement("b", "a"),
        Some(Requirement::Range("^1.3.0".to_string()))
    );

    let again = coordinator
        .sync_dependency_versions(false, true, |_| unreachable!())
        .unwrap();
    assert!(again.mismatches.is_empty());
}

#[test]
fn sync_settles_on_dev_stamped_versions() {
    let fx = chain();
    let a_manifest = fx.descriptor("a").path.join("pyproject.toml");
    let set_a = |version: &str| {
        let text = std::fs::read_to_string(&a_manifest).unwrap();
        let current = format!("version = \"{}\"", fx.version_of("a"));
        std::fs::write(&a_manifest, text.replace(&current, &format!("version = \"{}\"", version)))
            .unwrap();
    };
    let (ports, _handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    set_a("1.0.0+dev.20240101000000");
    let report = coordinator
        .sync_dependency_versions(false, true, |_| unreachable!())
        .unwrap();
    assert!(report.mismatches.is_empty());

    set_a("1.1.0+dev.20240102000000");
    let report = coordinator
        .sync_dependency_versions(false, true, |_| unreachable!())
        .unwrap();
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].actual_version, "1.1.0");
    assert!(report.success());
    assert_eq!(
        fx.requirement("b", "a"),
        Some(Requirement::Range("^1.1.0".to_string()))
    );

    let again = coordinator
        .sync_dependency_versions(false, true, |_| unreachable!())
        .unwrap();
    assert!(again.mismatches.is_empty());
}

#[tokio::test]
async fn status_reports_requirements_dependents_and_history() {
    let fx = chain();
    let (ports, _handles) = fx.ports();
    let coordinator = VersionCoordinator::new(fx.workspace.clone(), ports);

    let mut request = BumpRequest::new("a", VersionBump::Minor);
    request.update_dependents = false;
    request.validate = false;
    coordinator.bump_repository(request).await.unwrap();

    let status = coordinator.status(None).unwrap();
    assert_eq!(status.repositories.len(), 3);
    assert_eq!(status.history.len(), 1);

    let a = &status.repositories[0];
    assert_eq!(a.current_version.as_deref(), Some("1.1.0"));
    assert_eq!(a.dependents, vec!["b".to_string()]);

    let b = &status.repositories[1];
    assert_eq!(b.dependencies.len(), 1);
    assert_eq!(b.dependencies[0].current_version.as_deref(), Some("1.1.0"));
    assert_eq!(b.dependencies[0].compatible, Some(true));

    let only_c = coordinator.status(Some("c")).unwrap();
    assert_eq!(only_c.repositories.len(), 1);
    assert!(only_c.history.is_empty());

    assert!(coordinator.status(Some("missing")).is_err());
}
