// Core modules implementing the store, its statements, value typing, and error modeling.
pub mod error;
pub mod schema;
pub mod sql;
pub mod statement;
pub mod store;
pub mod value;
