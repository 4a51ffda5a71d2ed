//! Signal-driven choreography engine.
//!
//! Incoming [`Signal`]s are matched against authored [`ChoreographyDefinition`]s.
//! Every match spawns a performance that the scheduler walks tick by tick, emitting
//! start / update / complete / execute / interrupt commands to a [`CommandSink`].
//! Time only enters through a [`Clock`], so a [`ManualClock`] replays a signal
//! stream into a bit-identical command stream.

pub mod actions;
pub mod clock;
pub mod condition;
pub mod config;
pub mod definition;
mod dispatcher;
pub mod easing;
mod error;
pub mod ids;
pub mod live;
pub mod resolver;
mod scheduler;
pub mod signal;
pub mod sink;
mod stage;
pub mod types;

pub use actions::ActionCatalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::Pattern;
pub use config::ChoreographerConfig;
pub use definition::{ActionStep, ChoreographyDefinition, ChoreographyStep, WhenClause, WhenCondition, WhenOperator};
pub use dispatcher::TriggerDispatcher;
pub use easing::Easing;
pub use error::{ChoreographyError, Result};
pub use ids::{IdGenerator, IdStrategy, SequentialIds, UuidIds};
pub use live::LiveChoreographer;
pub use resolver::{ReferenceResolver, SceneDirectory};
pub use scheduler::{Choreography, Performance, PerformanceScheduler};
pub use signal::{FieldPath, Signal};
pub use sink::{Command, CommandSink, Params, RecordingSink, TracingSink};
pub use stage::{ChoreographyState, Choreographer, PerformanceSummary};
pub use types::{EntityHandle, PerformanceId, Position, Progress, Route, TimeMs, MAX_STEP_MS};
