pub mod compute;
pub mod handlers;
