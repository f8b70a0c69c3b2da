pub mod cache;
pub mod config;
pub mod keygen;
pub mod register;
pub mod resolver;
pub mod scheme;
pub mod server;
pub mod store;
pub mod validate;
pub mod writer;
