// Encode settings, presets and encoder supervision - independent of the CLI

pub mod core;
pub mod launcher;
pub mod supervisor;

pub use self::core::*;
pub use launcher::{EncoderLauncher, EncoderProcess, Launcher};
pub use supervisor::{
    Job, JobHandle, JobOutcome, JobSupervisor, OutputStream, PendingJob, PostAction,
    SupervisorMessage, SupervisorState, post_action_hook,
};
