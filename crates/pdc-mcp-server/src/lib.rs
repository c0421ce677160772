pub mod errors;
pub mod graphql;
pub mod server;
pub mod tools;
