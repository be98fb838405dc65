pub mod unread_repair;

pub use unread_repair::UnreadRepairWorker;
