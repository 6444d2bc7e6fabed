pub mod entity;
pub mod err;
pub mod filter;
pub mod kind;
pub mod parse;
pub mod point;
pub mod query;
pub mod traversal;
