#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Rate-limited execution for sempool
//!
//! Named shared resources (HTTP, SSH, databases, file handles, ...) are each
//! guarded by a [`PriorityGate`]: a low tier holding most of the capacity and
//! a small high tier reserved for high priority work. The [`Dispatcher`]
//! runs arbitrary [`Callable`]s under those gates and reports every wait,
//! acquisition and release to a telemetry sink.
//!
//! ```no_run
//! use sempool_config::Config;
//! use sempool_resources::{Callable, Dispatcher};
//! use sempool_types::Priority;
//!
//! # async fn demo() -> Result<(), sempool_errors::Error> {
//! let dispatcher = Dispatcher::from_config(&Config::default())?.build();
//! let status = dispatcher
//!     .run("http", Priority::Low, Callable::async_fn(|| async { 200 }))
//!     .await?;
//! assert_eq!(status, 200);
//! # Ok(())
//! # }
//! ```

pub mod availability;
pub mod callable;
pub mod dispatcher;
pub mod gate;
pub mod probe;
pub mod registry;
pub mod semaphore;

pub use availability::GateAvailability;
pub use callable::{Callable, CallableKind};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use gate::{GatePermit, PriorityGate, TierChoice};
pub use probe::{FnProbe, ProcessProbe, SystemProbe};
pub use registry::{tier_permits, ResourceRegistry};
pub use semaphore::{acquire_semaphore_permit, create_semaphore, try_acquire_semaphore_permit};
