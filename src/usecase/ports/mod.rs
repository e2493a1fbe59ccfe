pub mod events;
pub mod source;
pub mod store;
