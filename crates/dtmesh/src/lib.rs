//! Logical device meshes for distributed tensor programs.
//!
//! A [`Mesh`] names the dimensions of a grid of devices that spans every client of a cluster, records which global
//! device IDs belong to the current client, and maps those IDs to concrete local devices. Meshes are built from a
//! [`DeviceRuntime`] using either [`create_mesh`] (single-client) or [`create_distributed_mesh`] (multi-client):
//!
//! ```
//! use dtmesh::{ClusterConfig, DeviceType, DistributedMeshOptions, LocalRuntime, create_distributed_mesh};
//!
//! let runtime = LocalRuntime::new(ClusterConfig::new(1, 2)).with_devices(DeviceType::Gpu, 4);
//! let options = DistributedMeshOptions {
//!     device_type: DeviceType::Gpu,
//!     ..DistributedMeshOptions::new(vec![("batch", 2).into(), ("model", 4).into()])
//! };
//! let mesh = create_distributed_mesh(&runtime, options).unwrap();
//! assert_eq!(mesh.shape(), &[2, 4]);
//! assert_eq!(mesh.local_device_ids(), &[4, 5, 6, 7]);
//! ```

pub use dtmesh_core as core;
pub use dtmesh_runtime as runtime;

pub use dtmesh_core::builders::DistributedMeshOptions;
pub use dtmesh_core::builders::MeshOptions;
pub use dtmesh_core::builders::create_distributed_mesh;
pub use dtmesh_core::builders::create_mesh;
pub use dtmesh_core::builders::local_device_id_range;
pub use dtmesh_core::errors::MeshError;
pub use dtmesh_core::meshes::DimensionSpec;
pub use dtmesh_core::meshes::Mesh;
pub use dtmesh_core::meshes::MeshDimension;
pub use dtmesh_runtime::clusters::ClusterConfig;
pub use dtmesh_runtime::devices::DeviceSpec;
pub use dtmesh_runtime::devices::DeviceType;
pub use dtmesh_runtime::runtimes::DeviceRuntime;
pub use dtmesh_runtime::runtimes::LocalRuntime;
pub use dtmesh_runtime::topologies::TpuDeviceAssignment;
pub use dtmesh_runtime::topologies::TpuTopology;
