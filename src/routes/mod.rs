/// Router Module Index
///
/// Splits the routes by the access level the handlers expect. The route guard wrapped around
/// the whole router makes the first cut by path; the extractors on each handler make the
/// second one for API callers.

/// Routes reachable without a session (auth flow and admin bootstrap).
pub mod public;

/// Routes whose handlers take an `AuthUser`.
pub mod authenticated;

/// Routes whose handlers take an `AdminUser`.
pub mod admin;

/// HTML page shells and the access level each page expects from the guard.
pub mod pages;
