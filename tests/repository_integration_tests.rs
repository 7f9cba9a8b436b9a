use blog_backend::{
    ApiError,
    authz::Actor,
    models::{Blog, Identity, Role},
    repository::{MemoryRepository, Repository},
    storage::{MockStorageService, RecordSet, StorageError, StorageService},
    tokens::KeyScope,
};
use async_trait::async_trait;
use std::sync::Arc;

// --- Storage that refuses a single record set ---

/// Writes through to `inner` except for `refused`, which always fails.
struct RefusesOneSet {
    inner: MockStorageService,
    refused: RecordSet,
}

#[async_trait]
impl StorageService for RefusesOneSet {
    async fn read_set(&self, set: RecordSet) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.read_set(set).await
    }

    async fn write_set(&self, set: RecordSet, bytes: Vec<u8>) -> Result<(), StorageError> {
        if set == self.refused {
            return Err(StorageError::Unavailable(set.file_name().to_string()));
        }
        self.inner.write_set(set, bytes).await
    }
}

async fn refusing(storage: &MockStorageService, refused: RecordSet) -> MemoryRepository {
    let wrapper = RefusesOneSet {
        inner: storage.clone(),
        refused,
    };
    MemoryRepository::load(Arc::new(wrapper)).await.unwrap()
}

// --- Helpers ---

fn store() -> (MemoryRepository, MockStorageService) {
    let storage = MockStorageService::new();
    let repo = MemoryRepository::empty(Arc::new(storage.clone()));
    (repo, storage)
}

async fn identity(repo: &MemoryRepository, email: &str) -> Identity {
    repo.create_identity(email, format!("hash-of-{email}"))
        .await
        .expect("identity should be created")
}

fn session(identity: &Identity) -> Actor {
    Actor::new(identity.id, identity.role, KeyScope::Session)
}

fn admin_scope(identity: &Identity) -> Actor {
    Actor::new(identity.id, identity.role, KeyScope::Admin)
}

async fn blog(repo: &MemoryRepository, author: &Actor, title: &str) -> Blog {
    repo.create_blog(author, title.to_string(), "content".to_string())
        .await
        .expect("blog should be created")
}

fn document_text(bytes: Option<Vec<u8>>) -> String {
    String::from_utf8(bytes.unwrap_or_default()).unwrap()
}

// --- Credential Store ---

#[tokio::test]
async fn test_first_registration_is_the_only_admin() {
    let (repo, _) = store();

    let first = identity(&repo, "alice@example.com").await;
    let second = identity(&repo, "bob@example.com").await;
    let third = identity(&repo, "carol@example.com").await;

    assert_eq!((first.id, first.role), (1, Role::Admin));
    assert_eq!((second.id, second.role), (2, Role::User));
    assert_eq!((third.id, third.role), (3, Role::User));
}

#[tokio::test]
async fn test_duplicate_identity_in_either_role_is_rejected() {
    let (repo, _) = store();
    identity(&repo, "admin@example.com").await;
    identity(&repo, "user@example.com").await;

    for email in ["admin@example.com", "user@example.com"] {
        let err = repo.create_identity(email, "x".to_string()).await.unwrap_err();
        assert!(matches!(err, ApiError::DuplicateIdentity(_)), "{email}: {err:?}");
    }

    // No third record was created and no id was burned.
    assert!(repo.find_identity(3).await.is_none());
    let next = identity(&repo, "dave@example.com").await;
    assert_eq!(next.id, 3);
}

#[tokio::test]
async fn test_promote_requires_admin_scope() {
    let (repo, storage) = store();
    let admin = identity(&repo, "admin@example.com").await;
    let user = identity(&repo, "user@example.com").await;

    // An admin role claim alone, verified under the session key, is not enough.
    let err = repo
        .promote_identity(&session(&admin), "user@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));

    let promoted = repo
        .promote_identity(&admin_scope(&admin), "user@example.com")
        .await
        .unwrap();
    assert_eq!(promoted.id, user.id);
    assert_eq!(repo.find_identity(user.id).await.unwrap().role, Role::Admin);

    let users = document_text(storage.document(RecordSet::Users).await);
    let admins = document_text(storage.document(RecordSet::Admins).await);
    assert!(!users.contains("user@example.com"));
    assert!(admins.contains("user@example.com"));
}

#[tokio::test]
async fn test_promote_by_plain_user_is_denied() {
    let (repo, _) = store();
    identity(&repo, "admin@example.com").await;
    let user = identity(&repo, "user@example.com").await;
    identity(&repo, "other@example.com").await;

    let err = repo
        .promote_identity(&admin_scope(&user), "other@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
}

#[tokio::test]
async fn test_promote_unknown_or_existing_admin_is_not_found() {
    let (repo, _) = store();
    let admin = identity(&repo, "admin@example.com").await;

    for email in ["nobody@example.com", "admin@example.com"] {
        let err = repo
            .promote_identity(&admin_scope(&admin), email)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)), "{email}: {err:?}");
    }
}

// --- Blogs ---

#[tokio::test]
async fn test_toggle_like_twice_restores_original_state() {
    let (repo, _) = store();
    let admin = session(&identity(&repo, "admin@example.com").await);
    let user = session(&identity(&repo, "user@example.com").await);
    let post = blog(&repo, &admin, "Hello").await;

    let first = repo.toggle_like(&user, post.id).await.unwrap();
    assert!(first.liked);
    repo.toggle_like(&admin, post.id).await.unwrap();
    assert_eq!(repo.get_blog(post.id).await.unwrap().likes, vec![user.id, admin.id]);

    let second = repo.toggle_like(&user, post.id).await.unwrap();
    assert!(!second.liked);
    assert_eq!(second.likes, 1);
    assert_eq!(repo.get_blog(post.id).await.unwrap().likes, vec![admin.id]);
}

#[tokio::test]
async fn test_update_keeps_fields_sent_empty_or_absent() {
    let (repo, _) = store();
    let author = session(&identity(&repo, "admin@example.com").await);
    let post = blog(&repo, &author, "Original").await;

    let updated = repo
        .update_blog(&author, post.id, Some(String::new()), Some("New".to_string()))
        .await
        .unwrap();
    assert_eq!(updated.title, "Original");
    assert_eq!(updated.content, "New");

    let untouched = repo.update_blog(&author, post.id, None, None).await.unwrap();
    assert_eq!(untouched, updated);
}

#[tokio::test]
async fn test_update_and_delete_require_author_or_admin() {
    let (repo, _) = store();
    let admin = session(&identity(&repo, "admin@example.com").await);
    let alice = session(&identity(&repo, "alice@example.com").await);
    let bob = session(&identity(&repo, "bob@example.com").await);
    let post = blog(&repo, &alice, "Alice's").await;

    let err = repo
        .update_blog(&bob, post.id, Some("Hijacked".to_string()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    let err = repo.delete_blog(&bob, post.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    assert_eq!(repo.get_blog(post.id).await.unwrap().title, "Alice's");

    // Admin override.
    let moderated = repo
        .update_blog(&admin, post.id, Some("Moderated".to_string()), None)
        .await
        .unwrap();
    assert_eq!(moderated.title, "Moderated");
    repo.delete_blog(&admin, post.id).await.unwrap();
}

#[tokio::test]
async fn test_not_found_is_reported_before_authorization() {
    let (repo, _) = store();
    identity(&repo, "admin@example.com").await;
    let user = session(&identity(&repo, "user@example.com").await);

    let err = repo.delete_blog(&user, 99).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    let err = repo.update_blog(&user, 99, None, None).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_leaves_comments_orphaned() {
    let (repo, _) = store();
    let author = session(&identity(&repo, "admin@example.com").await);
    let post = blog(&repo, &author, "Doomed").await;
    repo.add_comment(&author, post.id, "first!".to_string(), None)
        .await
        .unwrap();

    repo.delete_blog(&author, post.id).await.unwrap();

    assert!(repo.list_blogs().await.is_empty());
    assert!(repo.get_blog(post.id).await.is_none());
    for err in [
        repo.update_blog(&author, post.id, None, None).await.unwrap_err(),
        repo.delete_blog(&author, post.id).await.unwrap_err(),
        repo.add_comment(&author, post.id, "late".to_string(), None)
            .await
            .unwrap_err(),
        repo.toggle_like(&author, post.id).await.map(|_| ()).unwrap_err(),
    ] {
        assert!(matches!(err, ApiError::NotFound(_)), "{err:?}");
    }

    // Known limitation: no cascade.
    let orphans = repo.get_comments(post.id).await;
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].body, "first!");
}

#[tokio::test]
async fn test_ids_are_never_reused_after_delete() {
    let (repo, _) = store();
    let author = session(&identity(&repo, "admin@example.com").await);
    let one = blog(&repo, &author, "one").await;
    let two = blog(&repo, &author, "two").await;
    repo.delete_blog(&author, two.id).await.unwrap();

    let three = blog(&repo, &author, "three").await;
    assert_eq!((one.id, two.id, three.id), (1, 2, 3));
}

// --- Comments ---

#[tokio::test]
async fn test_replies_must_stay_on_the_same_blog() {
    let (repo, _) = store();
    let author = session(&identity(&repo, "admin@example.com").await);
    let a = blog(&repo, &author, "a").await;
    let b = blog(&repo, &author, "b").await;
    let root = repo
        .add_comment(&author, a.id, "root".to_string(), None)
        .await
        .unwrap();

    let reply = repo
        .add_comment(&author, a.id, "reply".to_string(), Some(root.comment_id))
        .await
        .unwrap();
    assert_eq!(reply.parent_comment_id, Some(root.comment_id));

    let err = repo
        .add_comment(&author, b.id, "cross".to_string(), Some(root.comment_id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let err = repo
        .add_comment(&author, a.id, "ghost".to_string(), Some(42))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    // Zero means "no parent".
    let top = repo
        .add_comment(&author, a.id, "top".to_string(), Some(0))
        .await
        .unwrap();
    assert_eq!(top.parent_comment_id, None);

    let ids: Vec<u64> = repo
        .get_comments(a.id)
        .await
        .iter()
        .map(|c| c.comment_id)
        .collect();
    assert_eq!(ids, vec![root.comment_id, reply.comment_id, top.comment_id]);
}

#[tokio::test]
async fn test_comment_delete_requires_author_or_admin() {
    let (repo, _) = store();
    let admin = session(&identity(&repo, "admin@example.com").await);
    let alice = session(&identity(&repo, "alice@example.com").await);
    let bob = session(&identity(&repo, "bob@example.com").await);
    let post = blog(&repo, &alice, "post").await;
    let mine = repo
        .add_comment(&alice, post.id, "mine".to_string(), None)
        .await
        .unwrap();
    let also_mine = repo
        .add_comment(&alice, post.id, "also mine".to_string(), None)
        .await
        .unwrap();

    let err = repo.delete_comment(&bob, mine.comment_id).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));

    repo.delete_comment(&alice, mine.comment_id).await.unwrap();
    repo.delete_comment(&admin, also_mine.comment_id).await.unwrap();
    assert!(repo.get_comments(post.id).await.is_empty());

    let err = repo.delete_comment(&alice, mine.comment_id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// --- Persistence ---

#[tokio::test]
async fn test_reload_restores_state_and_sequences() {
    let (repo, storage) = store();
    let author = session(&identity(&repo, "admin@example.com").await);
    identity(&repo, "user@example.com").await;
    let keep = blog(&repo, &author, "keep").await;
    let gone = blog(&repo, &author, "gone").await;
    repo.toggle_like(&author, keep.id).await.unwrap();
    repo.delete_blog(&author, gone.id).await.unwrap();

    let reloaded = MemoryRepository::load(Arc::new(storage.clone())).await.unwrap();

    let admin = reloaded.find_identity_by_email("admin@example.com").await.unwrap();
    assert_eq!(admin.role, Role::Admin);
    assert_eq!(
        reloaded.find_identity_by_email("user@example.com").await.unwrap().role,
        Role::User
    );
    assert_eq!(reloaded.get_blog(keep.id).await.unwrap().likes, vec![author.id]);

    // Blog 2 was deleted before the restart; its id is still not reissued.
    let next = reloaded
        .create_blog(&author, "next".to_string(), "c".to_string())
        .await
        .unwrap();
    assert_eq!(next.id, 3);

    // Bootstrap is not re-evaluated after a restart.
    let later = identity(&reloaded, "later@example.com").await;
    assert_eq!(later.role, Role::User);
}

#[tokio::test]
async fn test_load_raises_sequences_to_highest_id() {
    let storage = MockStorageService::new();
    storage
        .seed(
            RecordSet::Users,
            r#"[{"id": 5, "email": "old@example.com", "passwordHash": "h"}]"#,
        )
        .await;
    storage.seed(RecordSet::Blogs, "   ").await;

    let repo = MemoryRepository::load(Arc::new(storage.clone())).await.unwrap();
    let next = identity(&repo, "new@example.com").await;

    assert_eq!(next.id, 6);
    assert_eq!(next.role, Role::User);
}

#[tokio::test]
async fn test_corrupt_document_fails_load() {
    let storage = MockStorageService::new();
    storage.seed(RecordSet::Comments, "{ not json").await;

    let err = MemoryRepository::load(Arc::new(storage)).await.err().unwrap();
    assert!(matches!(
        err,
        StorageError::Corrupt {
            set: RecordSet::Comments,
            ..
        }
    ));
}

#[tokio::test]
async fn test_failed_write_rolls_back() {
    let storage = MockStorageService::new();
    let healthy = MemoryRepository::empty(Arc::new(storage.clone()));
    let admin = identity(&healthy, "admin@example.com").await;

    let broken = MemoryRepository::load(Arc::new(storage.failing_view()))
        .await
        .unwrap();
    let err = broken
        .create_blog(&session(&admin), "t".to_string(), "c".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Storage(_)));
    assert!(broken.list_blogs().await.is_empty());

    let err = broken
        .create_identity("new@example.com", "h".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Storage(_)));
    assert!(broken.find_identity_by_email("new@example.com").await.is_none());
}

#[tokio::test]
async fn test_flush_writes_every_record_set() {
    let storage = MockStorageService::new();
    let repo = MemoryRepository::empty(Arc::new(storage.clone()));

    repo.flush().await.unwrap();

    for set in RecordSet::ALL {
        assert!(storage.document(set).await.is_some(), "{set:?} missing");
    }
    assert_eq!(document_text(storage.document(RecordSet::Blogs).await), "[]");
}

#[tokio::test]
async fn test_partial_promote_failure_restores_written_sets() {
    let (repo, storage) = store();
    let admin = identity(&repo, "admin@example.com").await;
    let user = identity(&repo, "user@example.com").await;

    // users.json is rewritten first, then admins.json is refused.
    let broken = refusing(&storage, RecordSet::Admins).await;
    let err = broken
        .promote_identity(&admin_scope(&admin), "user@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Storage(_)));
    assert_eq!(broken.find_identity(user.id).await.unwrap().role, Role::User);

    // On disk the user is still in exactly one role set.
    let users = document_text(storage.document(RecordSet::Users).await);
    let admins = document_text(storage.document(RecordSet::Admins).await);
    assert!(users.contains("user@example.com"));
    assert!(!admins.contains("user@example.com"));

    let reloaded = MemoryRepository::load(Arc::new(storage.clone())).await.unwrap();
    let restored = reloaded.find_identity(user.id).await.expect("user survives restart");
    assert_eq!(restored.role, Role::User);
}

#[tokio::test]
async fn test_partial_registration_failure_leaves_nothing_on_disk() {
    let (repo, storage) = store();
    identity(&repo, "admin@example.com").await;

    // users.json and admins.json are rewritten, then sequences.json is refused.
    let broken = refusing(&storage, RecordSet::Sequences).await;
    let err = broken
        .create_identity("late@example.com", "h".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Storage(_)));

    let users = document_text(storage.document(RecordSet::Users).await);
    assert!(!users.contains("late@example.com"));

    let reloaded = MemoryRepository::load(Arc::new(storage.clone())).await.unwrap();
    assert!(reloaded.find_identity_by_email("late@example.com").await.is_none());
    let next = identity(&reloaded, "next@example.com").await;
    assert_eq!(next.id, 2);
}

#[tokio::test]
async fn test_missing_blog_is_reported_before_empty_comment() {
    let (repo, _) = store();
    let author = session(&identity(&repo, "admin@example.com").await);
    let post = blog(&repo, &author, "short-lived").await;

    let err = repo
        .add_comment(&author, post.id, "  ".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    repo.delete_blog(&author, post.id).await.unwrap();
    let err = repo
        .add_comment(&author, post.id, String::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}
