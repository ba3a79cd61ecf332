/// API routes and handlers
pub mod blog;
pub mod certificates;
pub mod education;
pub mod experiences;
pub mod extract;
pub mod projects;
pub mod response;
pub mod site;
pub mod skills;
pub mod testimonials;

#[cfg(test)]
pub(crate) mod testing;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(projects::routes())
        .merge(blog::routes())
        .merge(skills::routes())
        .merge(certificates::routes())
        .merge(education::routes())
        .merge(experiences::routes())
        .merge(testimonials::routes())
        .merge(site::routes())
}
