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
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod config;
mod constants;

mod service {
    pub mod recipes;
    pub mod shopping_list;
    pub mod toggle;
}

pub use authentication::*;
pub use constants::*;
pub use database::*;
pub use service::*;
