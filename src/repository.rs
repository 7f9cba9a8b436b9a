use crate::{
    authz::{self, Action, Actor, Target},
    error::{ApiError, Result},
    models::{Blog, Comment, Identity, LikeResponse, Role, Sequences},
    storage::{RecordSet, StorageError, StorageState},
};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Repository Trait
///
/// The abstract contract for the credential store and the resource store. Handlers
/// only see this trait, so the backing implementation can be swapped in tests.
///
/// Every mutating method takes the acting identity and runs the existence check,
/// then the authorization decision, then the mutation, as one atomic step.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    // Fails with DuplicateIdentity if the email exists in either role. The first
    // identity ever created is made admin.
    async fn create_identity(&self, email: &str, password_hash: String) -> Result<Identity>;
    async fn find_identity_by_email(&self, email: &str) -> Option<Identity>;
    async fn find_identity(&self, id: u64) -> Option<Identity>;
    // One-way user → admin transition. Requires an admin-scope actor.
    async fn promote_identity(&self, actor: &Actor, email: &str) -> Result<Identity>;

    // --- Blogs ---
    async fn list_blogs(&self) -> Vec<Blog>;
    async fn get_blog(&self, id: u64) -> Option<Blog>;
    async fn create_blog(&self, actor: &Actor, title: String, content: String) -> Result<Blog>;
    // Absent or empty fields keep the stored value.
    async fn update_blog(
        &self,
        actor: &Actor,
        id: u64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Blog>;
    // Hard delete. Comments and likes referencing the blog are left in place.
    async fn delete_blog(&self, actor: &Actor, id: u64) -> Result<Blog>;
    async fn toggle_like(&self, actor: &Actor, id: u64) -> Result<LikeResponse>;

    // --- Comments ---
    async fn add_comment(
        &self,
        actor: &Actor,
        blog_id: u64,
        body: String,
        parent_comment_id: Option<u64>,
    ) -> Result<Comment>;
    // Creation order, including comments whose blog has been deleted.
    async fn get_comments(&self, blog_id: u64) -> Vec<Comment>;
    async fn delete_comment(&self, actor: &Actor, comment_id: u64) -> Result<Comment>;

    // --- Lifecycle ---
    /// Rewrites every record set from the in-memory state.
    async fn flush(&self) -> Result<()>;
}

/// RepositoryState
///
/// The concrete type used to share the store across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Everything the store owns. Cloned before each mutation so a failed write can be
/// rolled back.
#[derive(Debug, Clone, Default)]
struct Collections {
    identities: BTreeMap<u64, Identity>,
    blogs: BTreeMap<u64, Blog>,
    comments: Vec<Comment>,
    sequences: Sequences,
}

impl Collections {
    fn identity_by_email(&self, email: &str) -> Option<&Identity> {
        self.identities.values().find(|i| i.email == email)
    }

    fn identities_with_role(&self, role: Role) -> Vec<&Identity> {
        self.identities.values().filter(|i| i.role == role).collect()
    }

    fn encode(&self, set: RecordSet) -> Result<Vec<u8>> {
        let bytes = match set {
            RecordSet::Users => serde_json::to_vec_pretty(&self.identities_with_role(Role::User)),
            RecordSet::Admins => serde_json::to_vec_pretty(&self.identities_with_role(Role::Admin)),
            RecordSet::Blogs => serde_json::to_vec_pretty(&self.blogs.values().collect::<Vec<_>>()),
            RecordSet::Comments => serde_json::to_vec_pretty(&self.comments),
            RecordSet::Sequences => serde_json::to_vec_pretty(&self.sequences),
        };
        bytes.map_err(|e| ApiError::Internal(format!("encoding {}: {e}", set.file_name())))
    }

    /// Raises each sequence to at least the highest id present, so ids are never
    /// reissued even if the sequence document was lost.
    fn reconcile_sequences(&mut self) {
        let max_identity = self.identities.keys().next_back().copied().unwrap_or(0);
        let max_blog = self.blogs.keys().next_back().copied().unwrap_or(0);
        let max_comment = self.comments.iter().map(|c| c.comment_id).max().unwrap_or(0);
        self.sequences.identity = self.sequences.identity.max(max_identity);
        self.sequences.blog = self.sequences.blog.max(max_blog);
        self.sequences.comment = self.sequences.comment.max(max_comment);
    }
}

impl Sequences {
    fn next_identity(&mut self) -> u64 {
        self.identity += 1;
        self.identity
    }

    fn next_blog(&mut self) -> u64 {
        self.blog += 1;
        self.blog
    }

    fn next_comment(&mut self) -> u64 {
        self.comment += 1;
        self.comment
    }
}

/// MemoryRepository
///
/// The concrete `Repository`: all state in memory behind a single writer lock, with
/// every mutation written through to the storage collaborator before the lock is
/// released. Readers never observe a half-applied change (e.g. an identity in
/// neither or both role sets during promotion).
pub struct MemoryRepository {
    state: RwLock<Collections>,
    storage: StorageState,
}

impl MemoryRepository {
    /// Creates a store with no records, without reading the storage collaborator.
    pub fn empty(storage: StorageState) -> Self {
        Self {
            state: RwLock::new(Collections::default()),
            storage,
        }
    }

    /// load
    ///
    /// Reads every record set once. A missing or blank document is an empty set; a
    /// document that does not parse fails the load.
    pub async fn load(storage: StorageState) -> std::result::Result<Self, StorageError> {
        let users: Vec<Identity> = read_document(&storage, RecordSet::Users).await?;
        let admins: Vec<Identity> = read_document(&storage, RecordSet::Admins).await?;
        let blogs: Vec<Blog> = read_document(&storage, RecordSet::Blogs).await?;
        let mut comments: Vec<Comment> = read_document(&storage, RecordSet::Comments).await?;
        let sequences: Sequences = read_document(&storage, RecordSet::Sequences).await?;

        let mut collections = Collections {
            sequences,
            ..Collections::default()
        };
        // The file an identity is found in decides its role. Admins are inserted last
        // so an identity present in both files resolves to admin.
        for (records, role) in [(users, Role::User), (admins, Role::Admin)] {
            for mut identity in records {
                identity.role = role;
                if let Some(previous) = collections.identities.insert(identity.id, identity) {
                    tracing::warn!(id = previous.id, "identity present in both role sets");
                }
            }
        }
        collections.blogs = blogs.into_iter().map(|b| (b.id, b)).collect();
        comments.sort_by_key(|c| c.comment_id);
        collections.comments = comments;
        collections.reconcile_sequences();

        tracing::info!(
            identities = collections.identities.len(),
            blogs = collections.blogs.len(),
            comments = collections.comments.len(),
            "store loaded"
        );

        Ok(Self {
            state: RwLock::new(collections),
            storage,
        })
    }

    /// transact
    ///
    /// Applies `op` under the write lock, then rewrites `sets` in order. If `op` fails
    /// or any write fails, the in-memory state is restored to what it was before, and
    /// the sets already rewritten are written back from that snapshot.
    async fn transact<T, F>(&self, sets: &[RecordSet], op: F) -> Result<T>
    where
        F: FnOnce(&mut Collections) -> Result<T> + Send,
        T: Send,
    {
        let mut guard = self.state.write().await;
        let before = guard.clone();

        let value = match op(&mut *guard) {
            Ok(value) => value,
            Err(e) => {
                *guard = before;
                return Err(e);
            }
        };

        for (written, &set) in sets.iter().enumerate() {
            if let Err(e) = write_set(&self.storage, &*guard, set).await {
                tracing::error!(error = %e, file = set.file_name(), "persist failed, rolling back");
                restore(&self.storage, &before, &sets[..written]).await;
                *guard = before;
                return Err(e);
            }
        }
        Ok(value)
    }
}

async fn read_document<T>(storage: &StorageState, set: RecordSet) -> std::result::Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    match storage.read_set(set).await? {
        Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt { set, source })
        }
        _ => Ok(T::default()),
    }
}

async fn write_set(storage: &StorageState, collections: &Collections, set: RecordSet) -> Result<()> {
    let bytes = collections.encode(set)?;
    storage.write_set(set, bytes).await?;
    Ok(())
}

async fn persist(storage: &StorageState, collections: &Collections, sets: &[RecordSet]) -> Result<()> {
    for &set in sets {
        write_set(storage, collections, set).await?;
    }
    Ok(())
}

/// Rewrites `sets` from the pre-transaction snapshot. Failures are logged only.
async fn restore(storage: &StorageState, before: &Collections, sets: &[RecordSet]) {
    for &set in sets {
        if let Err(e) = write_set(storage, before, set).await {
            tracing::error!(error = %e, file = set.file_name(), "restore failed, disk is ahead of memory");
        }
    }
}

/// Overwrites `current` only with a non-empty value.
fn merge_field(current: &mut String, incoming: Option<String>) {
    if let Some(value) = incoming.filter(|v| !v.is_empty()) {
        *current = value;
    }
}

fn blog_not_found() -> ApiError {
    ApiError::NotFound("Blog not found".to_string())
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_identity(&self, email: &str, password_hash: String) -> Result<Identity> {
        let email = email.to_string();
        let sets = [RecordSet::Users, RecordSet::Admins, RecordSet::Sequences];
        let identity = self
            .transact(&sets, move |c| {
                if c.identity_by_email(&email).is_some() {
                    return Err(ApiError::DuplicateIdentity(email));
                }
                // Bootstrap rule: identities are never deleted, so an empty collection
                // means this is the first registration the system has ever seen.
                let role = if c.identities.is_empty() { Role::Admin } else { Role::User };
                let identity = Identity {
                    id: c.sequences.next_identity(),
                    email,
                    password_hash,
                    role,
                };
                c.identities.insert(identity.id, identity.clone());
                Ok(identity)
            })
            .await?;

        tracing::info!(id = identity.id, role = ?identity.role, "identity registered");
        Ok(identity)
    }

    async fn find_identity_by_email(&self, email: &str) -> Option<Identity> {
        self.state.read().await.identity_by_email(email).cloned()
    }

    async fn find_identity(&self, id: u64) -> Option<Identity> {
        self.state.read().await.identities.get(&id).cloned()
    }

    async fn promote_identity(&self, actor: &Actor, email: &str) -> Result<Identity> {
        let actor = *actor;
        let email = email.to_string();
        let promoted = self
            .transact(&[RecordSet::Users, RecordSet::Admins], move |c| {
                let mut target = c
                    .identity_by_email(&email)
                    .filter(|i| i.role == Role::User)
                    .cloned()
                    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
                authz::authorize(&actor, Target::Identity(&target), Action::Promote)?;

                target.role = Role::Admin;
                c.identities.insert(target.id, target.clone());
                Ok(target)
            })
            .await?;

        tracing::info!(id = promoted.id, by = actor.id, "identity promoted to admin");
        Ok(promoted)
    }

    async fn list_blogs(&self) -> Vec<Blog> {
        self.state.read().await.blogs.values().cloned().collect()
    }

    async fn get_blog(&self, id: u64) -> Option<Blog> {
        self.state.read().await.blogs.get(&id).cloned()
    }

    async fn create_blog(&self, actor: &Actor, title: String, content: String) -> Result<Blog> {
        let actor = *actor;
        let blog = self
            .transact(&[RecordSet::Blogs, RecordSet::Sequences], move |c| {
                authz::authorize(&actor, Target::Blogs, Action::Create)?;
                let blog = Blog {
                    id: c.sequences.next_blog(),
                    title,
                    content,
                    author_id: actor.id,
                    likes: Vec::new(),
                };
                c.blogs.insert(blog.id, blog.clone());
                Ok(blog)
            })
            .await?;

        tracing::info!(blog = blog.id, author = blog.author_id, "blog created");
        Ok(blog)
    }

    async fn update_blog(
        &self,
        actor: &Actor,
        id: u64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Blog> {
        let actor = *actor;
        self.transact(&[RecordSet::Blogs], move |c| {
            let blog = c.blogs.get_mut(&id).ok_or_else(blog_not_found)?;
            authz::authorize(&actor, Target::Blog(&*blog), Action::Update)?;

            merge_field(&mut blog.title, title);
            merge_field(&mut blog.content, content);
            Ok(blog.clone())
        })
        .await
    }

    async fn delete_blog(&self, actor: &Actor, id: u64) -> Result<Blog> {
        let actor = *actor;
        let removed = self
            .transact(&[RecordSet::Blogs], move |c| {
                let blog = c.blogs.get(&id).ok_or_else(blog_not_found)?;
                authz::authorize(&actor, Target::Blog(blog), Action::Delete)?;
                c.blogs.remove(&id).ok_or_else(blog_not_found)
            })
            .await?;

        tracing::info!(blog = id, by = actor.id, "blog deleted");
        Ok(removed)
    }

    async fn toggle_like(&self, actor: &Actor, id: u64) -> Result<LikeResponse> {
        let actor = *actor;
        self.transact(&[RecordSet::Blogs], move |c| {
            let blog = c.blogs.get_mut(&id).ok_or_else(blog_not_found)?;
            authz::authorize(&actor, Target::Blog(&*blog), Action::ToggleLike)?;

            let liked = match blog.likes.iter().position(|&who| who == actor.id) {
                Some(index) => {
                    blog.likes.remove(index);
                    false
                }
                None => {
                    blog.likes.push(actor.id);
                    true
                }
            };
            tracing::debug!(blog = id, by = actor.id, liked, "like toggled");
            Ok(LikeResponse {
                liked,
                likes: blog.likes.len(),
            })
        })
        .await
    }

    async fn add_comment(
        &self,
        actor: &Actor,
        blog_id: u64,
        body: String,
        parent_comment_id: Option<u64>,
    ) -> Result<Comment> {
        let actor = *actor;
        let comment = self
            .transact(&[RecordSet::Comments, RecordSet::Sequences], move |c| {
                let blog = c.blogs.get(&blog_id).ok_or_else(blog_not_found)?;
                authz::authorize(&actor, Target::Blog(blog), Action::Comment)?;
                if body.trim().is_empty() {
                    return Err(ApiError::Validation("Please provide a comment".to_string()));
                }

                // A parent id of 0 is the same as no parent.
                let parent_comment_id = parent_comment_id.filter(|&p| p != 0);
                if let Some(parent_id) = parent_comment_id {
                    match c.comments.iter().find(|p| p.comment_id == parent_id) {
                        None => {
                            return Err(ApiError::Validation(
                                "Parent comment not found".to_string(),
                            ));
                        }
                        Some(parent) if parent.blog_id != blog_id => {
                            return Err(ApiError::Validation(
                                "Parent comment belongs to a different blog".to_string(),
                            ));
                        }
                        Some(_) => {}
                    }
                }

                let comment = Comment {
                    comment_id: c.sequences.next_comment(),
                    blog_id,
                    user_id: actor.id,
                    body,
                    parent_comment_id,
                    created_at: Utc::now(),
                };
                c.comments.push(comment.clone());
                Ok(comment)
            })
            .await?;

        tracing::info!(comment = comment.comment_id, blog = blog_id, "comment added");
        Ok(comment)
    }

    async fn get_comments(&self, blog_id: u64) -> Vec<Comment> {
        self.state
            .read()
            .await
            .comments
            .iter()
            .filter(|c| c.blog_id == blog_id)
            .cloned()
            .collect()
    }

    async fn delete_comment(&self, actor: &Actor, comment_id: u64) -> Result<Comment> {
        let actor = *actor;
        self.transact(&[RecordSet::Comments], move |c| {
            let index = c
                .comments
                .iter()
                .position(|comment| comment.comment_id == comment_id)
                .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;
            authz::authorize(&actor, Target::Comment(&c.comments[index]), Action::Delete)?;
            Ok(c.comments.remove(index))
        })
        .await
    }

    async fn flush(&self) -> Result<()> {
        let guard = self.state.read().await;
        persist(&self.storage, &*guard, &RecordSet::ALL).await?;
        tracing::info!("store flushed");
        Ok(())
    }
}
