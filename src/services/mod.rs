pub mod conversation_resolver;
pub mod health_service;
pub mod message_service;
