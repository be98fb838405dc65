pub mod conversation;
pub mod message;
pub mod pagination;
pub mod profile;
pub mod view;
