use crate::integration::test_helpers::{change_id, Fixture};
use patchgate::PatchError;

/// Test that a dependency chain is reported nearest ancestor first
#[test]
fn test_gerrit_dependencies_nearest_first() {
    let fixture = Fixture::new();
    let bottom = format!("Bottom change\n\nChange-Id: {}\n", change_id(3001));
    let middle = format!("Middle change\n\nChange-Id: {}\n", change_id(3002));
    let top = format!("Top change\n\nChange-Id: {}\n", change_id(3003));

    let patch = fixture.push_chain(
        3003,
        1,
        &[
            ("one.txt", "1\n", bottom.as_str()),
            ("two.txt", "2\n", middle.as_str()),
            ("three.txt", "3\n", top.as_str()),
        ],
    );

    let deps = patch
        .gerrit_dependencies(&fixture.manifest, &fixture.buildroot)
        .expect("chain should resolve");
    assert_eq!(deps, vec![change_id(3002), change_id(3001)]);
}

/// Test that a change based directly on upstream has no dependencies
#[test]
fn test_gerrit_dependencies_empty_for_change_on_upstream() {
    let fixture = Fixture::new();
    let patch = fixture.push_change(3004, 1, "solo.txt", "solo\n", "Standalone change");

    let deps = patch
        .gerrit_dependencies(&fixture.manifest, &fixture.buildroot)
        .expect("standalone change should resolve");
    assert!(deps.is_empty());
}

/// Test that a dependency without a Change-Id trailer is an error
#[test]
fn test_gerrit_dependencies_require_change_id_trailers() {
    let fixture = Fixture::new();
    let top = format!("Top change\n\nChange-Id: {}\n", change_id(3005));

    let patch = fixture.push_chain(
        3005,
        1,
        &[
            ("four.txt", "4\n", "Bottom change\n\nNo trailer on this one.\n"),
            ("five.txt", "5\n", top.as_str()),
        ],
    );

    let err = patch
        .gerrit_dependencies(&fixture.manifest, &fixture.buildroot)
        .expect_err("untagged dependency should be rejected");
    match err {
        PatchError::MissingChangeId { description } => {
            assert!(description.contains("Bottom change"));
        }
        other => panic!("Expected a missing Change-Id error, got: {}", other),
    }
}

/// Test that resolving dependencies twice fetches and answers the same
#[test]
fn test_gerrit_dependencies_are_stable_across_fetches() {
    let fixture = Fixture::new();
    let bottom = format!("Bottom change\n\nChange-Id: {}\n", change_id(3006));
    let top = format!("Top change\n\nChange-Id: {}\n", change_id(3007));

    let patch = fixture.push_chain(
        3007,
        1,
        &[
            ("six.txt", "6\n", bottom.as_str()),
            ("seven.txt", "7\n", top.as_str()),
        ],
    );

    let first = patch
        .gerrit_dependencies(&fixture.manifest, &fixture.buildroot)
        .expect("first resolve should succeed");
    let second = patch
        .gerrit_dependencies(&fixture.manifest, &fixture.buildroot)
        .expect("second resolve should succeed");
    assert_eq!(first, second);
    assert_eq!(first, vec![change_id(3006)]);
}

/// Test that CQ-DEPEND lines are read off the commit message
#[test]
fn test_paladin_dependencies_from_commit_message() {
    let fixture = Fixture::new();
    let message = format!(
        "Add gadget\n\nCQ-DEPEND=10001, 10002\nCQ-DEPEND=I0ea54a2807e152ffcc401afb6dca0e751f786017\nChange-Id: {}\n",
        change_id(3008)
    );
    let patch = fixture.push_chain(3008, 1, &[("gadget.txt", "g\n", message.as_str())]);

    let deps = patch
        .paladin_dependencies(&fixture.manifest, &fixture.buildroot)
        .expect("message should be readable");
    assert_eq!(
        deps,
        vec!["10001", "10002", "I0ea54a2807e152ffcc401afb6dca0e751f786017"]
    );
}

/// Test that a change without CQ-DEPEND lines requests nothing
#[test]
fn test_paladin_dependencies_absent() {
    let fixture = Fixture::new();
    let patch = fixture.push_change(3009, 1, "h.txt", "h\n", "No requests here");

    let deps = patch
        .paladin_dependencies(&fixture.manifest, &fixture.buildroot)
        .expect("message should be readable");
    assert!(deps.is_empty());
}

/// Test that the full commit message of the patch set is retrievable
#[test]
fn test_commit_message_reads_the_patch_set() {
    let fixture = Fixture::new();
    let patch = fixture.push_change(3010, 1, "i.txt", "i\n", "Read me back");

    let message = patch
        .commit_message(&fixture.manifest, &fixture.buildroot)
        .expect("message should be readable");
    assert!(message.starts_with("Read me back\n"));
    assert!(message.contains(&format!("Change-Id: {}", change_id(3010))));
}
