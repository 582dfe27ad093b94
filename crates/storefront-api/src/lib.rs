pub mod auth;
pub mod authz;
pub mod categories;
pub mod error;
pub mod middleware;
pub mod products;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod token;

pub use routes::router;
pub use state::{AppState, AppStateInner};
pub use token::{AuthConfig, TokenIssuer};
