//! End-to-end flows through the service layer: admin gating, session-gated object
//! access and the account deletion cascade.

use std::sync::Arc;
use std::time::Duration;

use keygate::{AuthError, DeleteAuth, Key, MemoryBackend, Service, SessionConfig};

fn service() -> (Service, Key) {
    let svc = Service::new(Arc::new(MemoryBackend::new()), SessionConfig::default()).unwrap();
    let admin = svc.bootstrap_admin("root@x.com", "rootpw").unwrap().unwrap();
    (svc, admin)
}

#[test]
fn user_creation_requires_admin_key() {
    let (svc, admin) = service();
    assert!(matches!(svc.create_user("bogus", "bob@x.com", "pw1"), Err(AuthError::NotFound(_))));
    svc.create_user(admin.as_str(), "bob@x.com", "pw1").unwrap();
    assert!(matches!(
        svc.create_user(admin.as_str(), "bob@x.com", "pw1"),
        Err(AuthError::AlreadyExists(_))
    ));
    svc.users().check_password("bob@x.com", "pw1").unwrap();
}

#[test]
fn admin_and_user_spaces_are_separate() {
    let (svc, admin) = service();
    // The admin account cannot log in as a user.
    assert!(matches!(svc.login("root@x.com", "rootpw"), Err(AuthError::NotFound(_))));
    svc.create_user(admin.as_str(), "root@x.com", "userpw").unwrap();
    svc.login("root@x.com", "userpw").unwrap();
    svc.check_admin(admin.as_str()).unwrap();
}

#[test]
fn object_access_requires_live_session() {
    let (svc, admin) = service();
    svc.create_user(admin.as_str(), "alice@x.com", "pw").unwrap();
    assert!(matches!(
        svc.put_object("alice@x.com", "no-session", "o1", b"x".to_vec()),
        Err(AuthError::NotLoggedIn(_))
    ));
    let key = svc.login("alice@x.com", "pw").unwrap();
    svc.put_object("alice@x.com", key.as_str(), "o1", b"x".to_vec()).unwrap();
    assert!(matches!(
        svc.get_object("alice@x.com", "wrong", "o1"),
        Err(AuthError::BadToken(_))
    ));
    let obj = svc.get_object("alice@x.com", key.as_str(), "o1").unwrap();
    assert_eq!(obj.payload, b"x".to_vec());
    svc.logout("alice@x.com", key.as_str()).unwrap();
    assert!(matches!(
        svc.delete_object("alice@x.com", key.as_str(), "o1"),
        Err(AuthError::NotLoggedIn(_))
    ));
}

#[test]
fn logged_in_non_owner_is_unauthorized() {
    let (svc, admin) = service();
    svc.create_user(admin.as_str(), "alice@x.com", "pw").unwrap();
    svc.create_user(admin.as_str(), "bob@x.com", "pw").unwrap();
    let ka = svc.login("alice@x.com", "pw").unwrap();
    let kb = svc.login("bob@x.com", "pw").unwrap();
    svc.put_object("alice@x.com", ka.as_str(), "o1", b"secret".to_vec()).unwrap();
    assert!(matches!(svc.get_object("bob@x.com", kb.as_str(), "o1"), Err(AuthError::Unauthorized(_))));
    assert!(matches!(
        svc.put_object("bob@x.com", kb.as_str(), "o1", b"mine".to_vec()),
        Err(AuthError::Unauthorized(_))
    ));
    assert!(matches!(svc.delete_object("bob@x.com", kb.as_str(), "o1"), Err(AuthError::Unauthorized(_))));
    // absent ids delete cleanly for any logged-in caller
    svc.delete_object("bob@x.com", kb.as_str(), "never-existed").unwrap();
}

#[test]
fn timed_out_session_blocks_object_access() {
    let svc = Service::new(Arc::new(MemoryBackend::new()), SessionConfig::with_timeout(Duration::from_millis(30))).unwrap();
    let admin = svc.bootstrap_admin("root@x.com", "rootpw").unwrap().unwrap();
    svc.create_user(admin.as_str(), "alice@x.com", "pw").unwrap();
    let key = svc.login("alice@x.com", "pw").unwrap();
    std::thread::sleep(Duration::from_millis(60));
    assert!(matches!(
        svc.put_object("alice@x.com", key.as_str(), "o1", b"x".to_vec()),
        Err(AuthError::TimedOut(_))
    ));
}

#[test]
fn deleting_user_cascades_to_objects_and_session() {
    let (svc, admin) = service();
    svc.create_user(admin.as_str(), "alice@x.com", "pw").unwrap();
    svc.create_user(admin.as_str(), "bob@x.com", "pw").unwrap();
    let ka = svc.login("alice@x.com", "pw").unwrap();
    let kb = svc.login("bob@x.com", "pw").unwrap();
    svc.put_object("alice@x.com", ka.as_str(), "a1", b"1".to_vec()).unwrap();
    svc.put_object("alice@x.com", ka.as_str(), "a2", b"2".to_vec()).unwrap();
    svc.put_object("bob@x.com", kb.as_str(), "b1", b"3".to_vec()).unwrap();

    svc.delete_user(DeleteAuth::AdminKey(admin.as_str()), "alice@x.com").unwrap();

    assert!(svc.sessions().get("alice@x.com").unwrap().is_none());
    assert!(matches!(svc.validate("alice@x.com", ka.as_str()), Err(AuthError::NotLoggedIn(_))));
    assert!(matches!(svc.objects().get("a1", "alice@x.com"), Err(AuthError::NotFound(_))));
    assert!(matches!(svc.objects().get("a2", "alice@x.com"), Err(AuthError::NotFound(_))));
    assert_eq!(svc.get_object("bob@x.com", kb.as_str(), "b1").unwrap().payload, b"3".to_vec());
    assert!(matches!(
        svc.delete_user(DeleteAuth::AdminKey(admin.as_str()), "alice@x.com"),
        Err(AuthError::NotFound(_))
    ));
}

#[test]
fn self_deletion_needs_correct_password() {
    let (svc, admin) = service();
    svc.create_user(admin.as_str(), "alice@x.com", "pw").unwrap();
    assert!(matches!(
        svc.delete_user(DeleteAuth::Password("nope"), "alice@x.com"),
        Err(AuthError::InvalidCredential(_))
    ));
    svc.delete_user(DeleteAuth::Password("pw"), "alice@x.com").unwrap();
    assert!(matches!(svc.users().get("alice@x.com"), Err(AuthError::NotFound(_))));
}

#[test]
fn admin_lifecycle() {
    let (svc, root) = service();
    let second = svc.create_admin(root.as_str(), "ops@x.com", "opspw").unwrap();
    assert_ne!(second, root);
    assert!(matches!(svc.create_admin("bogus", "evil@x.com", "pw"), Err(AuthError::NotFound(_))));
    svc.delete_admin(second.as_str()).unwrap();
    assert!(matches!(svc.check_admin(second.as_str()), Err(AuthError::NotFound(_))));
    svc.check_admin(root.as_str()).unwrap();
}

#[test]
fn state_survives_snapshot_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("state.bin");
    let backend = MemoryBackend::open(&path).unwrap();
    let svc = Service::new(Arc::new(backend.clone()), SessionConfig::default()).unwrap();
    let admin = svc.bootstrap_admin("root@x.com", "rootpw").unwrap().unwrap();
    svc.create_user(admin.as_str(), "alice@x.com", "pw").unwrap();
    let key = svc.login("alice@x.com", "pw").unwrap();
    svc.put_object("alice@x.com", key.as_str(), "o1", b"kept".to_vec()).unwrap();
    backend.save_snapshot().unwrap();
    drop(svc);

    let reopened = Service::new(Arc::new(MemoryBackend::open(&path).unwrap()), SessionConfig::default()).unwrap();
    reopened.check_admin(admin.as_str()).unwrap();
    let obj = reopened.get_object("alice@x.com", key.as_str(), "o1").unwrap();
    assert_eq!(obj.payload, b"kept".to_vec());
}
