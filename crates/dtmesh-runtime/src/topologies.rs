use crate::{DeviceId, DeviceSpec, Error};

/// Placement of the devices of a TPU mesh, as negotiated by a [`TpuTopology`].
///
/// Unlike CPU and GPU meshes, whose device IDs follow from simple arithmetic over the number of clients and local
/// devices, TPU meshes must respect the physical interconnect of the TPU slice. The assignment therefore comes from
/// the topology service and is only validated (not computed) by mesh construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TpuDeviceAssignment {
    /// Global device IDs of the mesh in row-major order with respect to the requested mesh shape.
    pub global_device_ids: Vec<DeviceId>,

    /// Global device IDs that are local to the current client.
    pub local_device_ids: Vec<DeviceId>,

    /// Devices backing [`TpuDeviceAssignment::local_device_ids`], in the same order.
    pub local_devices: Vec<DeviceSpec>,
}

/// Service that maps logical TPU mesh shapes to physical TPU cores.
///
/// Implementations typically wrap a runtime that has already negotiated the TPU system configuration of the whole
/// cluster, which is why TPU meshes never accept user-provided cluster coordinates.
pub trait TpuTopology {
    /// Returns the [`TpuDeviceAssignment`] for a mesh named `mesh_name` with the provided `shape`.
    fn device_assignment(&self, shape: &[usize], mesh_name: &str) -> Result<TpuDeviceAssignment, Error>;
}
