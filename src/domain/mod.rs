pub mod events;

pub use events::{ParticipantCommand, ParticipantEvent};
