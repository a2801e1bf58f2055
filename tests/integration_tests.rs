//! Integration tests for passgroup.
//!
//! These tests drive the reconciler against real database files.

use passgroup::crypto::KdfParams;
use passgroup::error::GroupError;
use passgroup::group::{DEFAULT_ICON_ID, DEFAULT_NOTES};
use passgroup::params::GroupRequest;
use passgroup::reconciler::Reconciler;
use passgroup::store::{CredentialStore, Credentials, Database};
use passgroup::SensitiveString;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PASSWORD: &str = "correct horse battery staple";

/// Creates a test environment with an empty database in a temporary directory.
fn setup_test_env() -> (PathBuf, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("groups.db");
    Database::create(&db_path, &credentials(), KdfParams::minimal()).expect("Create failed");
    (db_path, temp_dir)
}

fn credentials() -> Credentials {
    Credentials::with_password(PASSWORD)
}

fn open(path: &Path) -> Database {
    Database::open(path, &credentials()).expect("Open failed")
}

fn request(name: &str, icon_id: Option<&str>, notes: Option<&str>, new_name: Option<&str>) -> GroupRequest {
    GroupRequest {
        name: name.to_string(),
        icon_id: icon_id.map(str::to_string),
        notes: notes.map(str::to_string),
        new_name: new_name.map(str::to_string),
    }
}

/// Each call opens the database afresh, like a separate invocation.
fn apply(path: &Path, action: &str, req: &GroupRequest) -> passgroup::Result<passgroup::Outcome> {
    let mut db = open(path);
    Reconciler::new(&mut db).apply(action, req)
}

// ============================================================================
// Create
// ============================================================================

#[test]
fn test_create_with_supplied_attributes() {
    let (db_path, _temp_dir) = setup_test_env();

    let outcome = apply(&db_path, "create", &request("Servers", Some("12"), Some("prod"), None))
        .expect("Create should succeed");
    assert!(outcome.changed);

    let groups = open(&db_path).find_groups("Servers", false);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].icon_id, "12");
    assert_eq!(groups[0].notes, "prod");
}

#[test]
fn test_create_with_defaults() {
    let (db_path, _temp_dir) = setup_test_env();

    let outcome = apply(&db_path, "create", &GroupRequest::named("Servers")).unwrap();
    let report = outcome.group.expect("Create reports the group");
    assert_eq!(report.icon_id, DEFAULT_ICON_ID);
    assert_eq!(report.notes, DEFAULT_NOTES);

    let groups = open(&db_path).find_groups("Servers", false);
    assert_eq!(groups[0].icon_id, "48");
    assert_eq!(groups[0].notes, "Generated by ansible.");
}

#[test]
fn test_create_twice_is_idempotent() {
    let (db_path, _temp_dir) = setup_test_env();

    let first = apply(&db_path, "create", &request("Servers", Some("5"), Some("first"), None)).unwrap();
    let second = apply(&db_path, "create", &request("Servers", Some("9"), Some("second"), None)).unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(first.group, second.group);

    let groups = open(&db_path).find_groups("Servers", false);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].icon_id, "5");
    assert_eq!(groups[0].notes, "first");
}

#[test]
fn test_create_in_check_mode_persists_nothing() {
    let (db_path, _temp_dir) = setup_test_env();
    let before = std::fs::read(&db_path).unwrap();

    let mut db = open(&db_path);
    let outcome = Reconciler::new(&mut db)
        .with_check_mode(true)
        .apply("create", &GroupRequest::named("Servers"))
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(std::fs::read(&db_path).unwrap(), before);
    assert!(open(&db_path).find_groups("Servers", false).is_empty());
}

// ============================================================================
// Modify
// ============================================================================

#[test]
fn test_modify_changes_only_supplied_fields() {
    let (db_path, _temp_dir) = setup_test_env();
    apply(&db_path, "create", &request("Servers", Some("5"), Some("keep me"), None)).unwrap();

    let outcome = apply(&db_path, "modify", &request("Servers", Some("20"), None, Some("Hosts"))).unwrap();
    assert!(outcome.changed);

    let db = open(&db_path);
    assert!(db.find_groups("Servers", false).is_empty());
    let groups = db.find_groups("Hosts", false);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].icon_id, "20");
    assert_eq!(groups[0].notes, "keep me");
}

#[test]
fn test_modify_with_same_values_still_reports_changed() {
    let (db_path, _temp_dir) = setup_test_env();
    apply(&db_path, "create", &request("Servers", Some("5"), Some("n"), None)).unwrap();

    let outcome = apply(&db_path, "modify", &request("Servers", Some("5"), Some("n"), None)).unwrap();
    assert!(outcome.changed);
}

#[test]
fn test_modify_nested_group() {
    let (db_path, _temp_dir) = setup_test_env();
    {
        let mut db = open(&db_path);
        let parent = db.add_group("Parent", "48", "").unwrap();
        db.group_mut(&parent.uuid)
            .unwrap()
            .groups
            .push(passgroup::Group::new("Child", "48", ""));
        db.save().unwrap();
    }

    apply(&db_path, "modify", &request("Child", None, Some("deep"), None)).unwrap();
    assert_eq!(open(&db_path).find_groups("Child", false)[0].notes, "deep");
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn test_delete_sole_match() {
    let (db_path, _temp_dir) = setup_test_env();
    apply(&db_path, "create", &GroupRequest::named("Servers")).unwrap();
    apply(&db_path, "create", &GroupRequest::named("Mail")).unwrap();

    let outcome = apply(&db_path, "delete", &GroupRequest::named("Servers")).unwrap();
    assert!(outcome.changed);
    assert!(outcome.group.is_none());

    let db = open(&db_path);
    assert!(db.find_groups("Servers", false).is_empty());
    assert_eq!(db.find_groups("Mail", false).len(), 1);
}

// ============================================================================
// Failure policy
// ============================================================================

#[test]
fn test_missing_group_fails_without_mutation() {
    let (db_path, _temp_dir) = setup_test_env();
    let before = std::fs::read(&db_path).unwrap();

    for action in ["modify", "delete"] {
        let err = apply(&db_path, action, &request("Ghost", None, Some("x"), None)).unwrap_err();
        assert!(matches!(err, GroupError::NotFound { .. }), "{} should be NotFound", action);
    }
    assert_eq!(std::fs::read(&db_path).unwrap(), before);
}

#[test]
fn test_duplicate_names_fail_without_mutation() {
    let (db_path, _temp_dir) = setup_test_env();
    {
        let mut db = open(&db_path);
        db.add_group("Twin", "1", "a").unwrap();
        db.add_group("Twin", "2", "b").unwrap();
        db.save().unwrap();
    }
    let before = std::fs::read(&db_path).unwrap();

    for action in ["modify", "delete"] {
        let err = apply(&db_path, action, &request("Twin", None, Some("x"), None)).unwrap_err();
        assert!(
            matches!(err, GroupError::AmbiguousMatch { count: 2, .. }),
            "{} should be ambiguous",
            action
        );
    }
    assert_eq!(std::fs::read(&db_path).unwrap(), before);

    // Create takes the first match and does nothing.
    let outcome = apply(&db_path, "create", &GroupRequest::named("Twin")).unwrap();
    assert!(!outcome.changed);
    assert_eq!(outcome.group.unwrap().icon_id, "1");
}

#[test]
fn test_open_errors_are_distinct() {
    let (db_path, temp_dir) = setup_test_env();

    let missing = Database::open(&temp_dir.path().join("absent.db"), &credentials());
    assert!(matches!(missing, Err(GroupError::NotFound { .. })));

    let wrong = Database::open(&db_path, &Credentials::with_password("wrong"));
    assert!(matches!(wrong, Err(GroupError::Authentication)));

    let content = std::fs::read_to_string(&db_path).unwrap();
    let tampered = content.replacen("\"iterations\": 1", "\"iterations\": 2", 1);
    assert_ne!(content, tampered);
    std::fs::write(&db_path, tampered).unwrap();
    let corrupt = Database::open(&db_path, &credentials());
    assert!(matches!(corrupt, Err(GroupError::Corruption(_))));
}

#[test]
fn test_keyfile_only_database() {
    let temp_dir = TempDir::new().unwrap();
    let keyfile = temp_dir.path().join("db.key");
    std::fs::write(&keyfile, b"0123456789abcdef").unwrap();
    let db_path = temp_dir.path().join("keyfile.db");
    let creds = Credentials::new(None, Some(keyfile.clone()));
    Database::create(&db_path, &creds, KdfParams::minimal()).unwrap();

    let mut db = Database::open(&db_path, &creds).unwrap();
    Reconciler::new(&mut db)
        .apply("create", &GroupRequest::named("Servers"))
        .unwrap();

    let with_password = Credentials::new(Some(SensitiveString::new("extra")), Some(keyfile));
    assert!(matches!(
        Database::open(&db_path, &with_password),
        Err(GroupError::Authentication)
    ));
    assert_eq!(
        Database::open(&db_path, &creds).unwrap().find_groups("Servers", false).len(),
        1
    );
}
