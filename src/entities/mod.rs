pub mod prelude;

pub mod photos;
pub mod role;
pub mod users;

pub use role::Role;
