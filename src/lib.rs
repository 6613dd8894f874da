mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod memory;
    pub mod pagination;
    pub mod schema;
    pub mod store;
}
mod authentication {
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod service {
    pub mod loader;
    pub mod recipes;
    pub mod relations;
    pub mod shopping;
}
mod report {
    pub mod document;
    pub mod list;
}
mod api {
    pub mod filters;
    pub mod handlers;
}
mod config;
mod constants;

pub use api::*;
pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use report::*;
pub use service::*;
