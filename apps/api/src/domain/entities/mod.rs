pub mod account;
pub mod inbound_event;
pub mod subscription;
