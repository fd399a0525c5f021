//! Device references, cluster coordinates, and the runtime interfaces that mesh construction reads from.
//!
//! This crate does not talk to any accelerator itself. It defines:
//!
//!   - [`DeviceType`] and [`DeviceSpec`], which name logical devices
//!     (e.g., `/job:localhost/replica:0/task:0/device:CPU:0`),
//!   - [`ClusterConfig`], which holds the coordinates of the current client and can be resolved from the environment,
//!   - [`DeviceRuntime`] and [`TpuTopology`], which abstract over device enumeration and TPU device assignment, and
//!   - [`LocalRuntime`], a [`DeviceRuntime`] with a configurable number of logical devices per device type.

pub mod clusters;
pub mod devices;
pub mod errors;
pub mod runtimes;
pub mod topologies;

pub use clusters::*;
pub use devices::*;
pub use errors::*;
pub use runtimes::*;
pub use topologies::*;
