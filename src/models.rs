pub mod messages;
pub mod quiz;
pub mod sessions;
pub mod users;
