pub use super::photos::Entity as Photos;
pub use super::users::Entity as Users;
