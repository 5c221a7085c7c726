pub mod attendance;
pub mod error;
pub mod ids;
pub mod role;
pub mod user;
