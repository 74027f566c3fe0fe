pub mod arbiter;
pub mod channel;
pub mod job;
pub mod state;

pub use arbiter::{RequestArbiter, RequestKey, RequestToken, SlotOutcome};
pub use channel::{ComputeChannel, JobTicket};
pub use job::{Job, JobName, JobOutput};
pub use state::SlotState;
