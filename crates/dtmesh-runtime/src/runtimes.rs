use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::{ClientId, ClusterConfig, DeviceSpec, DeviceType, Error, TpuTopology};

/// Distributed runtime that owns the devices that meshes are built over.
///
/// Mesh construction only ever _reads_ from the runtime: it enumerates devices, resolves the coordinates of the
/// current client, and (for TPU meshes) asks for a device assignment. Only [`DeviceRuntime::logical_devices`] and the
/// cluster coordinate accessors must be implemented; the remaining functions have defaults that derive global and
/// per-client device information assuming that all clients see the same number of devices of each type.
pub trait DeviceRuntime {
    /// Returns all logical devices of `device_type` that are visible to the current client.
    fn logical_devices(&self, device_type: &DeviceType) -> Vec<DeviceSpec>;

    /// Number of clients in the cluster.
    fn num_clients(&self) -> usize;

    /// ID of the current client.
    fn client_id(&self) -> ClientId;

    /// Name of the job that all clients belong to.
    fn job_name(&self) -> &str;

    /// Number of devices of `device_type` that are local to the current client.
    fn num_local_devices(&self, device_type: &DeviceType) -> usize {
        self.logical_devices(device_type).len()
    }

    /// Number of devices of `device_type` across all clients in the cluster. Saturates at [`usize::MAX`] instead of
    /// overflowing.
    fn num_global_devices(&self, device_type: &DeviceType) -> usize {
        self.num_local_devices(device_type).saturating_mul(self.num_clients())
    }

    /// Returns the devices of `device_type` that are local to client `client_id`, named the way that client names
    /// them (i.e., `/job:<job>/replica:0/task:<client_id>/device:<type>:<index>`).
    fn local_devices(&self, device_type: &DeviceType, client_id: ClientId) -> Vec<DeviceSpec> {
        (0..self.num_local_devices(device_type))
            .map(|index| DeviceSpec::new(self.job_name(), 0, client_id, device_type.clone(), index))
            .collect()
    }

    /// Returns the [`TpuTopology`] of this runtime, or [`None`] if TPUs are not available.
    fn tpu_topology(&self) -> Option<&dyn TpuTopology> {
        None
    }
}

/// [`DeviceRuntime`] backed by a [`ClusterConfig`] and a fixed number of logical devices per [`DeviceType`].
///
/// By default, a [`LocalRuntime`] exposes a single logical CPU device, matching what a freshly started process sees
/// before any logical device configuration happens. More devices (e.g., virtual CPU devices for testing multi-device
/// meshes on a single host) can be added using [`LocalRuntime::with_devices`].
#[derive(Clone)]
pub struct LocalRuntime {
    cluster: ClusterConfig,
    device_counts: HashMap<DeviceType, usize>,
    tpu_topology: Option<Arc<dyn TpuTopology + Send + Sync>>,
}

impl LocalRuntime {
    /// Creates a new [`LocalRuntime`] for the provided cluster configuration with one logical CPU device.
    pub fn new(cluster: ClusterConfig) -> Self {
        Self { cluster, device_counts: HashMap::from([(DeviceType::Cpu, 1)]), tpu_topology: None }
    }

    /// Creates a new [`LocalRuntime`] whose cluster configuration is resolved from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(ClusterConfig::from_env()?))
    }

    /// Sets the number of logical devices of `device_type` that this runtime exposes.
    pub fn with_devices(mut self, device_type: DeviceType, count: usize) -> Self {
        self.device_counts.insert(device_type, count);
        self
    }

    /// Attaches a [`TpuTopology`] to this runtime.
    pub fn with_tpu_topology(mut self, tpu_topology: Arc<dyn TpuTopology + Send + Sync>) -> Self {
        self.tpu_topology = Some(tpu_topology);
        self
    }
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new(ClusterConfig::single_client())
    }
}

impl DeviceRuntime for LocalRuntime {
    fn logical_devices(&self, device_type: &DeviceType) -> Vec<DeviceSpec> {
        self.local_devices(device_type, self.cluster.client_id)
    }

    fn num_clients(&self) -> usize {
        self.cluster.num_clients
    }

    fn client_id(&self) -> ClientId {
        self.cluster.client_id
    }

    fn job_name(&self) -> &str {
        self.cluster.job_name.as_str()
    }

    fn num_local_devices(&self, device_type: &DeviceType) -> usize {
        self.device_counts.get(device_type).copied().unwrap_or(0)
    }

    fn tpu_topology(&self) -> Option<&dyn TpuTopology> {
        self.tpu_topology.as_deref().map(|tpu_topology| tpu_topology as &dyn TpuTopology)
    }
}

impl Debug for LocalRuntime {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LocalRuntime")
            .field("cluster", &self.cluster)
            .field("device_counts", &self.device_counts)
            .field("has_tpu_topology", &self.tpu_topology.is_some())
            .finish()
    }
}
