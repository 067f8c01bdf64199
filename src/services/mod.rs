pub mod ai;
pub mod conversation;
pub mod extraction;
pub mod messaging;
pub mod qualification;
pub mod registry;
pub mod sheets;
pub mod state_machine;
pub mod triggers;
pub mod voice;
