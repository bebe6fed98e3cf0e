pub mod auth;
pub mod collections;
pub mod guard;
pub mod links;
pub mod router;
pub mod sites;
pub mod state;
pub mod studies;
pub mod subjects;
pub mod templates;
pub mod validation;
pub mod visit;

pub use state::AppState;
pub use templates::escape_html;
