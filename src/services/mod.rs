//! Service layer: the components that give the ring its behaviour.

pub mod clustering;
pub mod dispatcher;
pub mod keymap;
pub mod ring_manager;
pub mod scheduler;
pub mod suggester;
pub mod workflow_pipeline;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use ring_manager::{RingChanged, RingManager};
pub use scheduler::Scheduler;
pub use suggester::Suggester;
pub use workflow_pipeline::WorkflowPipeline;
