/// Router Module Index
///
/// Splits the HTTP surface by who may call it. Tokens travel in the JSON body, so
/// identity is resolved inside each handler rather than by a router layer; the split
/// keeps the three access classes visibly apart.

/// Routes anyone may call: registration, login and read-only views.
pub mod public;

/// Routes that require a session-scope token.
pub mod authenticated;

/// Routes that require an admin-scope token.
pub mod admin;
