pub mod avatar;

pub use avatar::{AvatarOutcome, AvatarProvider, GravatarProvider, resolve_avatar};
