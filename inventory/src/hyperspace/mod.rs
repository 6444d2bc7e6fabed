pub mod compiler;
pub mod err;
pub mod registry;
pub mod schema;
pub mod substrate;
