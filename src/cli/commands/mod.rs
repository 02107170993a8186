mod accounts;
mod update;

pub use accounts::{cmd_count_photos, cmd_list_accounts, cmd_show_account};
pub use update::{cmd_confirm_email, cmd_refresh_avatar, cmd_set_avatar, cmd_set_role};
