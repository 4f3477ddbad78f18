//! Built-in type knowledge.

pub mod oid;

pub use oid::builtin_type_name;
