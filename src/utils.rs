pub mod email;
pub mod shutdown;
