//! Authorization resolver.
//!
//! A pure decision over (actor, target, action). Existence of the target is the
//! caller's concern and is checked first, so a missing resource is reported as
//! `NotFound` rather than as a denial.

use crate::{
    error::ApiError,
    models::{Blog, Comment, Identity, Role},
    tokens::{Claims, KeyScope},
};

/// Actor
///
/// A verified identity acting on a request: id, role, and the key scope its token
/// was verified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: u64,
    pub role: Role,
    pub scope: KeyScope,
}

impl Actor {
    pub fn new(id: u64, role: Role, scope: KeyScope) -> Self {
        Self { id, role, scope }
    }

    pub fn from_claims(claims: &Claims, scope: KeyScope) -> Self {
        Self::new(claims.id, claims.role, scope)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    Promote,
    ToggleLike,
    Comment,
}

/// What an action is aimed at. `Blogs` is the collection itself (creation).
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Blogs,
    Blog(&'a Blog),
    Comment(&'a Comment),
    Identity(&'a Identity),
}

/// can_mutate
///
/// - create a blog, comment on a blog, toggle a like: any authenticated identity.
/// - update/delete a blog or comment: its author, or an admin.
/// - promote an identity: an admin whose token was verified under the admin scope.
///
/// Every other pairing is denied.
pub fn can_mutate(actor: &Actor, target: Target<'_>, action: Action) -> bool {
    match (action, target) {
        (Action::Create, Target::Blogs) => true,
        (Action::Comment | Action::ToggleLike, Target::Blog(_)) => true,
        (Action::Update | Action::Delete, Target::Blog(blog)) => {
            blog.author_id == actor.id || actor.is_admin()
        }
        (Action::Update | Action::Delete, Target::Comment(comment)) => {
            comment.user_id == actor.id || actor.is_admin()
        }
        (Action::Promote, Target::Identity(_)) => {
            actor.is_admin() && actor.scope == KeyScope::Admin
        }
        _ => false,
    }
}

/// Same decision as `can_mutate`, as a `Result` carrying a human message on denial.
pub fn authorize(actor: &Actor, target: Target<'_>, action: Action) -> Result<(), ApiError> {
    if can_mutate(actor, target, action) {
        return Ok(());
    }
    tracing::warn!(actor = actor.id, role = ?actor.role, ?action, "authorization denied");
    Err(ApiError::Unauthorized(denial_message(target, action)))
}

fn denial_message(target: Target<'_>, action: Action) -> String {
    match (action, target) {
        (Action::Promote, _) => "Unauthorized: Only admins can promote new admins".to_string(),
        (Action::Update, Target::Blog(_)) => "Unauthorized to update this blog".to_string(),
        (Action::Delete, Target::Blog(_)) => "Unauthorized to delete this blog".to_string(),
        (Action::Update, Target::Comment(_)) => "Unauthorized to update this comment".to_string(),
        (Action::Delete, Target::Comment(_)) => "Unauthorized to delete this comment".to_string(),
        _ => "Unauthorized".to_string(),
    }
}
