pub mod engine;
pub mod intent;
pub mod machine;
pub mod policy;
pub mod state;
pub mod validation;

pub use engine::{ChatEngine, ChatReply, ChatTurn, EngineError};
pub use intent::{classify, Intent};
pub use machine::{RegistrationFlow, RegistrationStore};
pub use state::{Member, MemberStep, RegistrationSession, RegistrationState};
