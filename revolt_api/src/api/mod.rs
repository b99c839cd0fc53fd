pub mod files;
pub mod messages;
pub mod users;
