use crate::{AppState, guard::RouteClass, handlers};
use axum::{Router, routing::get};

/// Page
///
/// A browser-facing route. `access` is the level the page is written for; the guard's
/// [`RouteTable`](crate::guard::RouteTable) must classify `path` the same way, otherwise a
/// public page would bounce anonymous visitors to `/login` (and `/login` itself would loop).
#[derive(Debug)]
pub struct Page {
    pub path: &'static str,
    pub title: &'static str,
    pub access: RouteClass,
}

pub static PAGES: &[Page] = &[
    Page {
        path: "/",
        title: "Dashboard",
        access: RouteClass::Protected,
    },
    Page {
        path: "/login",
        title: "Sign in",
        access: RouteClass::Public,
    },
    Page {
        path: "/register",
        title: "Create account",
        access: RouteClass::Public,
    },
    Page {
        path: "/forgot-password",
        title: "Forgot password",
        access: RouteClass::Public,
    },
    Page {
        path: "/reset-password",
        title: "Reset password",
        access: RouteClass::Public,
    },
    Page {
        path: "/reports",
        title: "Reports",
        access: RouteClass::Protected,
    },
    Page {
        path: "/admin",
        title: "Admin",
        access: RouteClass::AdminOnly,
    },
];

pub fn page_routes() -> Router<AppState> {
    PAGES.iter().fold(Router::new(), |router, page| {
        router.route(page.path, get(move || handlers::render_page(page)))
    })
}
