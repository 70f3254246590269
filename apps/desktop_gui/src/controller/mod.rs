pub mod events;
pub mod orchestration;
