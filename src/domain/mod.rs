pub mod compare;
pub mod entities;
