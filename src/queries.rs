pub mod messages;
pub mod quiz;
pub mod users;
