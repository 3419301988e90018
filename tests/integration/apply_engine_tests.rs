use crate::integration::test_helpers::{
    self, commit_count, current_branch, is_in_rebase_state, Fixture,
};
use patchgate::{ApplyKind, PatchError, PATCH_BRANCH};

/// Test that a clean change lands on the validation branch
#[test]
fn test_clean_patch_lands_on_validation_branch() {
    let fixture = Fixture::new();
    let patch = fixture.push_change(2144, 1, "widget.txt", "widget\n", "Add widget");

    patch
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect("clean patch should apply");

    let checkout = fixture.buildroot_checkout();
    assert_eq!(current_branch(&checkout), PATCH_BRANCH);
    assert!(checkout.join("widget.txt").exists());
    assert_eq!(commit_count(&checkout, PATCH_BRANCH), 2);

    let subject = test_helpers::git(&checkout, &["log", "-1", "--format=%s", PATCH_BRANCH]);
    assert_eq!(subject.trim(), "Add widget");

    // The validation branch tracks the manifest's default branch.
    let upstream = test_helpers::git(
        &checkout,
        &["rev-parse", "--abbrev-ref", &format!("{}@{{upstream}}", PATCH_BRANCH)],
    );
    assert_eq!(upstream.trim(), "origin/master");
}

/// Test that independent changes stack on the validation branch in order
#[test]
fn test_patches_stack_on_validation_branch() {
    let fixture = Fixture::new();
    let first = fixture.push_change(1001, 1, "a.txt", "a\n", "Add a");
    let second = fixture.push_change(1002, 1, "b.txt", "b\n", "Add b");

    first
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect("first patch should apply");
    second
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect("second patch should apply");

    let checkout = fixture.buildroot_checkout();
    assert!(checkout.join("a.txt").exists());
    assert!(checkout.join("b.txt").exists());
    assert_eq!(commit_count(&checkout, PATCH_BRANCH), 3);

    let subjects = test_helpers::git(&checkout, &["log", "--format=%s", PATCH_BRANCH]);
    assert_eq!(subjects.trim(), "Add b\nAdd a\nInitial commit");
}

/// Test that applying the same change twice leaves the branch unchanged
#[test]
fn test_reapplying_a_change_is_a_no_op() {
    let fixture = Fixture::new();
    let patch = fixture.push_change(1003, 1, "c.txt", "c\n", "Add c");

    patch
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect("first apply should succeed");

    let checkout = fixture.buildroot_checkout();
    let tip = test_helpers::rev_parse(&checkout, PATCH_BRANCH);

    patch
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect("re-apply should be a no-op, not a failure");

    assert_eq!(test_helpers::rev_parse(&checkout, PATCH_BRANCH), tip);
    assert_eq!(commit_count(&checkout, PATCH_BRANCH), 2);
    assert_eq!(current_branch(&checkout), PATCH_BRANCH);
}

/// Test that a collision with an already-staged change blames the in-flight
/// change, not upstream
#[test]
fn test_collision_with_staged_change_is_classified_in_flight() {
    let fixture = Fixture::new();
    let first = fixture.push_change(2001, 1, "file.txt", "edited by first\n", "First edit");
    let second = fixture.push_change(2002, 1, "file.txt", "edited by second\n", "Second edit");

    first
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect("first patch should apply");

    let err = second
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect_err("second patch should conflict");

    match err {
        PatchError::Apply { patch, kind } => {
            assert_eq!(kind, ApplyKind::RebaseAgainstInFlight);
            assert_eq!(patch.to_string(), "dev:2002");
        }
        other => panic!("Expected an apply failure, got: {}", other),
    }

    // The checkout is back on the validation branch with nothing half done.
    let checkout = fixture.buildroot_checkout();
    assert_eq!(current_branch(&checkout), PATCH_BRANCH);
    assert!(!is_in_rebase_state(&checkout));
    assert_eq!(commit_count(&checkout, PATCH_BRANCH), 2);

    let status = test_helpers::git(&checkout, &["status", "--porcelain"]);
    assert!(status.trim().is_empty(), "worktree left dirty: {}", status);
}

/// Test that a change upstream moved out from under is blamed on the change
#[test]
fn test_stale_change_is_classified_against_tip() {
    let fixture = Fixture::new();
    // Written against the original file...
    let stale = fixture.push_change(2003, 1, "file.txt", "stale edit\n", "Stale edit");
    // ...then master rewrites the same file underneath it.
    fixture.advance_master("file.txt", "rewritten upstream\n", "Upstream rewrite");
    fixture.sync_buildroot();

    let err = stale
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect_err("stale patch should be rejected");

    match err {
        PatchError::Apply { kind, .. } => assert_eq!(kind, ApplyKind::RebaseAgainstTip),
        other => panic!("Expected an apply failure, got: {}", other),
    }

    let checkout = fixture.buildroot_checkout();
    assert_eq!(current_branch(&checkout), PATCH_BRANCH);
    assert!(!is_in_rebase_state(&checkout));
    // Only the synced upstream history is on the branch.
    assert_eq!(commit_count(&checkout, PATCH_BRANCH), 2);
}

/// Test that trivial mode refuses a merge git itself could do
#[test]
fn test_trivial_mode_refuses_content_level_merges() {
    let fixture = Fixture::new();
    // Both changes touch file.txt, at opposite ends.
    let first = fixture.push_change(
        2005,
        1,
        "file.txt",
        "line0\nline1\nline2\nline3\n",
        "Prepend line",
    );
    let second = fixture.push_change(
        2006,
        1,
        "file.txt",
        "line1\nline2\nline3\nline4\n",
        "Append line",
    );

    first
        .apply(&fixture.manifest, &fixture.buildroot, true)
        .expect("first patch touches nothing staged yet");

    let err = second
        .apply(&fixture.manifest, &fixture.buildroot, true)
        .expect_err("trivial mode should refuse the overlap");
    match err {
        PatchError::Apply { kind, .. } => assert_eq!(kind, ApplyKind::RebaseAgainstInFlight),
        other => panic!("Expected an apply failure, got: {}", other),
    }

    // Without trivial mode the same pair merges fine.
    second
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect("content-level merge should succeed outside trivial mode");

    let checkout = fixture.buildroot_checkout();
    assert_eq!(commit_count(&checkout, PATCH_BRANCH), 3);
    let merged = std::fs::read_to_string(checkout.join("file.txt")).unwrap();
    assert_eq!(merged, "line0\nline1\nline2\nline3\nline4\n");
}

/// Test that a patch for a project the manifest does not list is rejected
#[test]
fn test_unknown_project_is_rejected() {
    let fixture = Fixture::new();
    let mut patch = fixture.push_change(2007, 1, "d.txt", "d\n", "Add d");
    patch.project = "no/such/project".to_string();

    let err = patch
        .apply(&fixture.manifest, &fixture.buildroot, false)
        .expect_err("unlisted project should be rejected");
    assert!(matches!(err, PatchError::UnknownProject(_)));
}
