pub mod events;
pub mod handlers;
pub mod reconcile;
pub mod signature;
