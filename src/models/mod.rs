pub mod booking;
pub mod conversation;
pub mod qualification;
pub mod session;

pub use booking::{Booking, BookingPayload, BookingStatus, SheetRow};
pub use conversation::{Channel, ConversationRecord, ConversationSummary};
pub use qualification::{LeadStatus, Priority, QualificationResult};
pub use session::{
    ConversationMessage, ConversationState, IntakeData, Role, Session, SessionSnapshot, Slot,
};
