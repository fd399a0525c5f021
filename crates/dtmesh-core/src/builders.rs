//! Single-client and distributed mesh builders.
//!
//! Both builders read everything they need from a [`DeviceRuntime`] and return fully validated [`Mesh`]es:
//!
//!   - [`create_mesh`] builds a single-client mesh over either an explicit list of devices or all logical devices of
//!     a given type. The current client owns every device, so all global device IDs are local.
//!   - [`create_distributed_mesh`] builds a mesh that spans all clients of a cluster. For CPU and GPU meshes, the
//!     global device IDs `0..num_global_devices` are split into contiguous, equally-sized per-client ranges and the
//!     current client picks its own range. For TPU meshes, device placement comes from the [`TpuTopology`] of the
//!     runtime instead.
//!
//! [`TpuTopology`]: dtmesh_runtime::TpuTopology

use std::ops::Range;

use ndarray::{ArrayD, IxDyn};

use dtmesh_runtime::{ClientId, DeviceRuntime, DeviceSpec, DeviceType};

use crate::{DEFAULT_DIMENSION_NAME, DimensionSpec, Mesh, MeshContext, MeshError, device_id_grid, resolve_shape};

/// Options for [`create_mesh`].
///
/// The default options create a one-dimensional CPU mesh with an empty name over all logical CPU devices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshOptions {
    /// Mesh dimensions. Defaults to a single dimension named [`DEFAULT_DIMENSION_NAME`] that spans all devices.
    pub dimensions: Option<Vec<DimensionSpec>>,

    /// Name of the mesh. Defaults to an empty name.
    pub name: String,

    /// Devices to use, given as the device part of a device specification (e.g., `CPU:0`). Defaults to all logical
    /// devices of [`MeshOptions::device_type`].
    pub devices: Option<Vec<String>>,

    /// Type of the devices to use. When [`MeshOptions::devices`] is missing this defaults to [`DeviceType::Cpu`], and
    /// otherwise to the type of the first provided device, which it must match if specified.
    pub device_type: Option<DeviceType>,
}

/// Options for [`create_distributed_mesh`].
///
/// For CPU and GPU meshes, any missing cluster coordinate is filled in from the [`DeviceRuntime`]. Explicit values
/// take precedence, which is useful for building meshes that use fewer devices than the runtime makes available.
/// For TPU meshes, none of the cluster coordinates can be provided.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistributedMeshOptions {
    /// Mesh dimensions.
    pub dimensions: Vec<DimensionSpec>,

    /// Name of the mesh.
    pub name: String,

    /// Number of devices across all clients. Defaults to [`DeviceRuntime::num_global_devices`].
    pub num_global_devices: Option<usize>,

    /// Number of clients. Defaults to [`DeviceRuntime::num_clients`].
    pub num_clients: Option<usize>,

    /// ID of the current client. Defaults to [`DeviceRuntime::client_id`].
    pub client_id: Option<ClientId>,

    /// Type of the devices to build the mesh over.
    pub device_type: DeviceType,
}

impl DistributedMeshOptions {
    /// Creates new [`DistributedMeshOptions`] for a CPU mesh with the provided dimensions and all other options set
    /// to their defaults.
    pub fn new(dimensions: Vec<DimensionSpec>) -> Self {
        Self { dimensions, ..Self::default() }
    }
}

/// Creates a single-client mesh.
///
/// Explicit devices are interpreted as devices of the single-client cluster (i.e., `CPU:0` refers to
/// `/job:localhost/replica:0/task:0/device:CPU:0`). A dimension with an inferred size is resolved against the number
/// of devices, so a single inferred dimension always spans all of them.
pub fn create_mesh<R: DeviceRuntime + ?Sized>(runtime: &R, options: MeshOptions) -> Result<Mesh, MeshError> {
    let MeshOptions { dimensions, name, devices, device_type } = options;
    let devices = match devices {
        None => {
            let device_type = device_type.unwrap_or_default();
            let devices = runtime.logical_devices(&device_type);
            if devices.is_empty() {
                return Err(MeshError::NoDevices { device_type });
            }
            devices
        }
        Some(device_names) => {
            let devices = device_names.iter().map(DeviceSpec::parse_local).collect::<Result<Vec<_>, _>>()?;
            let Some(inferred) = devices.first().map(|device| device.device_type().clone()) else {
                return Err(MeshError::NoDevices { device_type: device_type.unwrap_or_default() });
            };
            match device_type {
                Some(requested) if requested != inferred => {
                    return Err(MeshError::ConflictingDeviceType {
                        requested,
                        inferred,
                        devices: devices.iter().map(DeviceSpec::to_string).collect(),
                    });
                }
                _ => devices,
            }
        }
    };

    let dimensions = dimensions.unwrap_or_else(|| vec![DimensionSpec::inferred(DEFAULT_DIMENSION_NAME)]);
    let num_devices = devices.len();
    let shape = resolve_shape(&dimensions, num_devices)?;
    let global_device_ids = device_id_grid(num_devices, &shape)?;
    let local_device_ids = global_device_ids.iter().copied().collect();
    let mesh = Mesh::new(name, dimension_names(&dimensions), global_device_ids, local_device_ids, devices)?;
    MeshContext {
        client_id: 0,
        num_clients: 1,
        device_type: mesh.device_type(),
        num_global_devices: num_devices,
        mesh: &mesh,
    }
    .log();
    Ok(mesh)
}

/// Creates a single- or multi-client mesh.
///
/// For CPU and GPU meshes this validates the cluster coordinates (explicit or runtime-provided):
///
///   - `num_global_devices` and `num_clients` must be positive,
///   - `client_id` must be smaller than `num_clients`,
///   - `num_global_devices` must be divisible by `num_clients`, and
///   - the runtime must have at least `num_global_devices / num_clients` local devices. If it has more, only the
///     first ones are used.
///
/// The current client then owns the global device IDs in [`local_device_id_range`]. For TPU meshes, the cluster
/// coordinates must all be missing and device placement is delegated to the [`TpuTopology`] of the runtime. All
/// other device types are rejected.
///
/// [`TpuTopology`]: dtmesh_runtime::TpuTopology
pub fn create_distributed_mesh<R: DeviceRuntime + ?Sized>(
    runtime: &R,
    options: DistributedMeshOptions,
) -> Result<Mesh, MeshError> {
    if options.device_type.is_cpu_or_gpu() {
        create_cpu_or_gpu_mesh(runtime, options)
    } else if options.device_type == DeviceType::Tpu {
        create_tpu_mesh(runtime, options)
    } else {
        Err(MeshError::UnsupportedDeviceType { device_type: options.device_type })
    }
}

/// Returns the range of global device IDs (in row-major mesh order) that belong to client `client_id`, after
/// validating the cluster coordinates. Every client owns `num_global_devices / num_clients` devices and the ranges of
/// consecutive clients are adjacent.
pub fn local_device_id_range(
    num_global_devices: usize,
    num_clients: usize,
    client_id: ClientId,
) -> Result<Range<usize>, MeshError> {
    if num_global_devices == 0 {
        return Err(MeshError::InvalidGlobalDeviceCount { num_global_devices });
    }
    if num_clients == 0 {
        return Err(MeshError::InvalidClientCount { num_clients });
    }
    if client_id >= num_clients {
        return Err(MeshError::InvalidClientId { client_id, num_clients });
    }
    if num_global_devices % num_clients != 0 {
        return Err(MeshError::IndivisibleDeviceCount { num_global_devices, num_clients });
    }
    let num_local_devices = num_global_devices / num_clients;
    let start = num_local_devices * client_id;
    Ok(start..start + num_local_devices)
}

fn create_cpu_or_gpu_mesh<R: DeviceRuntime + ?Sized>(
    runtime: &R,
    options: DistributedMeshOptions,
) -> Result<Mesh, MeshError> {
    let DistributedMeshOptions { dimensions, name, num_global_devices, num_clients, client_id, device_type } = options;
    let num_global_devices = num_global_devices.unwrap_or_else(|| runtime.num_global_devices(&device_type));
    let num_clients = num_clients.unwrap_or_else(|| runtime.num_clients());
    let client_id = client_id.unwrap_or_else(|| runtime.client_id());
    let local_range = local_device_id_range(num_global_devices, num_clients, client_id)?;

    let num_local_devices = local_range.len();
    let num_available_devices = runtime.num_local_devices(&device_type);
    if num_local_devices > num_available_devices {
        return Err(MeshError::NotEnoughDevices { needed: num_local_devices, available: num_available_devices });
    }
    let local_devices = runtime.local_devices(&device_type, client_id).into_iter().take(num_local_devices).collect();

    let shape = resolve_shape(&dimensions, num_global_devices)?;
    let global_device_ids = device_id_grid(num_global_devices, &shape)?;
    let flattened_device_ids = global_device_ids.iter().copied().collect::<Vec<_>>();
    let local_device_ids = flattened_device_ids[local_range].to_vec();

    let mesh = Mesh::new(name, dimension_names(&dimensions), global_device_ids, local_device_ids, local_devices)?;
    MeshContext { client_id, num_clients, device_type: &device_type, num_global_devices, mesh: &mesh }.log();
    Ok(mesh)
}

fn create_tpu_mesh<R: DeviceRuntime + ?Sized>(runtime: &R, options: DistributedMeshOptions) -> Result<Mesh, MeshError> {
    let DistributedMeshOptions { dimensions, name, num_global_devices, num_clients, client_id, device_type } = options;
    for (argument, is_set) in [
        ("num_global_devices", num_global_devices.is_some()),
        ("num_clients", num_clients.is_some()),
        ("client_id", client_id.is_some()),
    ] {
        if is_set {
            return Err(MeshError::TpuArgumentNotAllowed { argument: argument.to_string() });
        }
    }

    let tpu_topology = runtime.tpu_topology().ok_or(MeshError::TpuTopologyUnavailable)?;
    let num_global_devices = runtime.num_global_devices(&device_type);
    let shape = resolve_shape(&dimensions, num_global_devices)?;
    let assignment = tpu_topology.device_assignment(&shape, name.as_str())?;
    let device_count = assignment.global_device_ids.len();
    let global_device_ids = ArrayD::from_shape_vec(IxDyn(&shape), assignment.global_device_ids)
        .map_err(|_| MeshError::ShapeMismatch { shape: shape.clone(), device_count })?;

    let mesh = Mesh::new(
        name,
        dimension_names(&dimensions),
        global_device_ids,
        assignment.local_device_ids,
        assignment.local_devices,
    )?;
    MeshContext {
        client_id: runtime.client_id(),
        num_clients: runtime.num_clients(),
        device_type: &device_type,
        num_global_devices,
        mesh: &mesh,
    }
    .log();
    Ok(mesh)
}

fn dimension_names(dimensions: &[DimensionSpec]) -> Vec<&str> {
    dimensions.iter().map(DimensionSpec::name).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dtmesh_runtime::{ClusterConfig, Error, LocalRuntime, TpuDeviceAssignment, TpuTopology};

    use super::*;

    /// [`TpuTopology`] that assigns TPU cores to clients in row-major order, with `cores_per_client` cores per client.
    struct RowMajorTpuTopology {
        client_id: ClientId,
        cores_per_client: usize,
    }

    impl TpuTopology for RowMajorTpuTopology {
        fn device_assignment(&self, shape: &[usize], _mesh_name: &str) -> Result<TpuDeviceAssignment, Error> {
            let device_count = shape.iter().product::<usize>();
            let start = self.client_id * self.cores_per_client;
            Ok(TpuDeviceAssignment {
                global_device_ids: (0..device_count).rev().collect(),
                local_device_ids: (start..start + self.cores_per_client).collect(),
                local_devices: (0..self.cores_per_client)
                    .map(|index| DeviceSpec::new("worker", 0, self.client_id, DeviceType::Tpu, index))
                    .collect(),
            })
        }
    }

    /// [`TpuTopology`] that returns a fixed result for every device assignment.
    struct FixedTpuTopology(Result<TpuDeviceAssignment, Error>);

    impl TpuTopology for FixedTpuTopology {
        fn device_assignment(&self, _shape: &[usize], _mesh_name: &str) -> Result<TpuDeviceAssignment, Error> {
            self.0.clone()
        }
    }

    fn test_cpu_runtime(client_id: ClientId, num_clients: usize, num_devices: usize) -> LocalRuntime {
        LocalRuntime::new(ClusterConfig::new(client_id, num_clients)).with_devices(DeviceType::Cpu, num_devices)
    }

    fn test_tpu_runtime(client_id: ClientId, num_clients: usize) -> LocalRuntime {
        LocalRuntime::new(ClusterConfig::new(client_id, num_clients))
            .with_devices(DeviceType::Tpu, 4)
            .with_tpu_topology(Arc::new(RowMajorTpuTopology { client_id, cores_per_client: 4 }))
    }

    // -----------------------------------------------------------------------
    // Single-client mesh tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_create_mesh_defaults() {
        let runtime = test_cpu_runtime(0, 1, 4);
        let mesh = create_mesh(&runtime, MeshOptions::default()).unwrap();
        assert_eq!(mesh.name(), "");
        assert_eq!(mesh.dimension_names(), vec!["x"]);
        assert_eq!(mesh.shape(), &[4]);
        assert_eq!(mesh.local_device_ids(), &[0, 1, 2, 3]);
        assert_eq!(mesh.local_devices(), runtime.logical_devices(&DeviceType::Cpu).as_slice());
        assert_eq!(mesh.device_type(), &DeviceType::Cpu);
    }

    #[test]
    fn test_create_mesh_with_dimensions() {
        let runtime = test_cpu_runtime(0, 1, 8);
        let options = MeshOptions {
            dimensions: Some(vec![DimensionSpec::new("batch", 2), DimensionSpec::new("model", 4)]),
            name: "mesh".to_string(),
            ..MeshOptions::default()
        };
        let mesh = create_mesh(&runtime, options).unwrap();
        assert_eq!(mesh.name(), "mesh");
        assert_eq!(mesh.shape(), &[2, 4]);
        assert_eq!(mesh.global_device_ids(), &device_id_grid(8, &[2, 4]).unwrap());
        assert_eq!(mesh.local_device_ids(), (0..8).collect::<Vec<_>>().as_slice());
        assert_eq!(mesh.device_coordinates(5), Some(vec![1, 1]));
    }

    #[test]
    fn test_create_mesh_with_inferred_dimension() {
        let runtime = test_cpu_runtime(0, 1, 6);
        let options =
            MeshOptions { dimensions: Some(vec![DimensionSpec::inferred("batch")]), ..MeshOptions::default() };
        assert_eq!(create_mesh(&runtime, options).unwrap().shape(), &[6]);

        let options = MeshOptions {
            dimensions: Some(vec![DimensionSpec::inferred("batch"), DimensionSpec::new("model", 3)]),
            ..MeshOptions::default()
        };
        assert_eq!(create_mesh(&runtime, options).unwrap().shape(), &[2, 3]);
    }

    #[test]
    fn test_create_mesh_with_explicit_devices() {
        let runtime = test_cpu_runtime(0, 1, 1);
        let options = MeshOptions {
            devices: Some(vec!["GPU:0".to_string(), "GPU:1".to_string()]),
            ..MeshOptions::default()
        };
        let mesh = create_mesh(&runtime, options).unwrap();
        assert_eq!(mesh.device_type(), &DeviceType::Gpu);
        assert_eq!(mesh.shape(), &[2]);
        assert_eq!(mesh.local_devices()[1].to_string(), "/job:localhost/replica:0/task:0/device:GPU:1");

        let options = MeshOptions {
            devices: Some(vec!["gpu:0".to_string(), "gpu:1".to_string()]),
            device_type: Some(DeviceType::from("Gpu")),
            ..MeshOptions::default()
        };
        assert_eq!(create_mesh(&runtime, options).unwrap().device_type(), &DeviceType::Gpu);
    }

    #[test]
    fn test_create_mesh_with_conflicting_device_type() {
        let runtime = test_cpu_runtime(0, 1, 1);
        let options = MeshOptions {
            devices: Some(vec!["CPU:0".to_string()]),
            device_type: Some(DeviceType::Gpu),
            ..MeshOptions::default()
        };
        assert!(matches!(
            create_mesh(&runtime, options),
            Err(MeshError::ConflictingDeviceType { requested: DeviceType::Gpu, inferred: DeviceType::Cpu, .. }),
        ));
    }

    #[test]
    fn test_create_mesh_errors() {
        let runtime = test_cpu_runtime(0, 1, 4);
        assert_eq!(
            create_mesh(&runtime, MeshOptions { device_type: Some(DeviceType::Gpu), ..MeshOptions::default() }),
            Err(MeshError::NoDevices { device_type: DeviceType::Gpu }),
        );
        assert_eq!(
            create_mesh(&runtime, MeshOptions { devices: Some(Vec::new()), ..MeshOptions::default() }),
            Err(MeshError::NoDevices { device_type: DeviceType::Cpu }),
        );
        assert!(matches!(
            create_mesh(&runtime, MeshOptions { devices: Some(vec!["CPU".to_string()]), ..MeshOptions::default() }),
            Err(MeshError::Runtime(Error::InvalidDeviceSpec { .. })),
        ));
        assert_eq!(
            create_mesh(
                &runtime,
                MeshOptions { dimensions: Some(vec![DimensionSpec::new("x", 3)]), ..MeshOptions::default() },
            ),
            Err(MeshError::ShapeMismatch { shape: vec![3], device_count: 4 }),
        );
        assert_eq!(
            create_mesh(
                &runtime,
                MeshOptions {
                    devices: Some(vec!["CPU:0".to_string(), "CPU:0".to_string()]),
                    ..MeshOptions::default()
                },
            ),
            Err(MeshError::DuplicateDevice { device: "/job:localhost/replica:0/task:0/device:CPU:0".to_string() }),
        );
    }

    // -----------------------------------------------------------------------
    // Distributed CPU/GPU mesh tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_local_device_id_range() {
        assert_eq!(local_device_id_range(8, 2, 0), Ok(0..4));
        assert_eq!(local_device_id_range(8, 2, 1), Ok(4..8));
        assert_eq!(local_device_id_range(8, 1, 0), Ok(0..8));
        assert_eq!(local_device_id_range(0, 2, 0), Err(MeshError::InvalidGlobalDeviceCount { num_global_devices: 0 }));
        assert_eq!(local_device_id_range(8, 0, 0), Err(MeshError::InvalidClientCount { num_clients: 0 }));
        assert_eq!(local_device_id_range(8, 2, 2), Err(MeshError::InvalidClientId { client_id: 2, num_clients: 2 }));
        assert_eq!(
            local_device_id_range(6, 4, 0),
            Err(MeshError::IndivisibleDeviceCount { num_global_devices: 6, num_clients: 4 }),
        );
    }

    #[test]
    fn test_create_distributed_mesh_from_runtime() {
        let runtime = test_cpu_runtime(1, 2, 4);
        let options = DistributedMeshOptions {
            name: "mesh".to_string(),
            ..DistributedMeshOptions::new(vec![DimensionSpec::new("batch", 4), DimensionSpec::new("model", 2)])
        };
        let mesh = create_distributed_mesh(&runtime, options).unwrap();
        assert_eq!(mesh.name(), "mesh");
        assert_eq!(mesh.shape(), &[4, 2]);
        assert_eq!(mesh.num_global_devices(), 8);
        assert_eq!(mesh.local_device_ids(), &[4, 5, 6, 7]);
        assert_eq!(mesh.local_device_coordinates(), vec![vec![2, 0], vec![2, 1], vec![3, 0], vec![3, 1]]);
        assert_eq!(mesh.local_devices(), runtime.local_devices(&DeviceType::Cpu, 1).as_slice());
        assert_eq!(mesh.local_devices()[0].to_string(), "/job:worker/replica:0/task:1/device:CPU:0");
    }

    #[test]
    fn test_create_distributed_mesh_with_explicit_arguments() {
        let runtime = test_cpu_runtime(0, 1, 8).with_devices(DeviceType::Gpu, 8);
        let options = DistributedMeshOptions {
            num_global_devices: Some(12),
            num_clients: Some(3),
            client_id: Some(2),
            device_type: DeviceType::Gpu,
            ..DistributedMeshOptions::new(vec![DimensionSpec::inferred("batch"), DimensionSpec::new("model", 2)])
        };
        let mesh = create_distributed_mesh(&runtime, options).unwrap();
        assert_eq!(mesh.shape(), &[6, 2]);
        assert_eq!(mesh.local_device_ids(), &[8, 9, 10, 11]);
        assert_eq!(mesh.num_local_devices(), 4);
        assert!(mesh.local_devices().iter().all(|device| device.task() == 2 && device.index() < 4));
        assert_eq!(mesh.device_type(), &DeviceType::Gpu);
    }

    #[test]
    fn test_create_distributed_mesh_with_fewer_devices_than_available() {
        let runtime = test_cpu_runtime(0, 1, 8);
        let options = DistributedMeshOptions {
            num_global_devices: Some(2),
            ..DistributedMeshOptions::new(vec![("x", 2).into()])
        };
        let mesh = create_distributed_mesh(&runtime, options).unwrap();
        assert_eq!(mesh.local_devices(), &runtime.logical_devices(&DeviceType::Cpu)[..2]);
    }

    #[test]
    fn test_create_distributed_mesh_validation() {
        let runtime = test_cpu_runtime(0, 2, 4);
        let options = |num_global_devices, num_clients, client_id| DistributedMeshOptions {
            num_global_devices,
            num_clients,
            client_id,
            ..DistributedMeshOptions::new(vec![DimensionSpec::inferred("x")])
        };
        assert_eq!(
            create_distributed_mesh(&runtime, options(Some(0), None, None)),
            Err(MeshError::InvalidGlobalDeviceCount { num_global_devices: 0 }),
        );
        assert_eq!(
            create_distributed_mesh(&runtime, options(None, Some(0), None)),
            Err(MeshError::InvalidClientCount { num_clients: 0 }),
        );
        assert_eq!(
            create_distributed_mesh(&runtime, options(None, None, Some(2))),
            Err(MeshError::InvalidClientId { client_id: 2, num_clients: 2 }),
        );
        assert_eq!(
            create_distributed_mesh(&runtime, options(Some(6), Some(4), None)),
            Err(MeshError::IndivisibleDeviceCount { num_global_devices: 6, num_clients: 4 }),
        );
        assert_eq!(
            create_distributed_mesh(&runtime, options(Some(16), None, None)),
            Err(MeshError::NotEnoughDevices { needed: 8, available: 4 }),
        );
        let mesh = create_distributed_mesh(&runtime, options(Some(8), Some(2), Some(1))).unwrap();
        assert_eq!(mesh.local_device_ids(), &[4, 5, 6, 7]);
    }

    #[test]
    fn test_create_distributed_mesh_with_inconsistent_dimensions() {
        let runtime = test_cpu_runtime(0, 2, 4);
        let options = DistributedMeshOptions::new(vec![DimensionSpec::new("x", 2), DimensionSpec::new("y", 2)]);
        assert_eq!(
            create_distributed_mesh(&runtime, options),
            Err(MeshError::ShapeMismatch { shape: vec![2, 2], device_count: 8 }),
        );
    }

    #[test]
    fn test_create_distributed_mesh_with_unsupported_device_type() {
        let runtime = test_cpu_runtime(0, 1, 4).with_devices(DeviceType::from("npu"), 4);
        let options = DistributedMeshOptions {
            device_type: DeviceType::from(" cpu "),
            ..DistributedMeshOptions::new(vec![DimensionSpec::inferred("x")])
        };
        assert_eq!(create_distributed_mesh(&runtime, options).map(|mesh| mesh.num_local_devices()), Ok(4));

        let options = DistributedMeshOptions {
            device_type: DeviceType::from("npu"),
            ..DistributedMeshOptions::new(vec![DimensionSpec::inferred("x")])
        };
        assert_eq!(
            create_distributed_mesh(&runtime, options),
            Err(MeshError::UnsupportedDeviceType { device_type: DeviceType::from("NPU") }),
        );
    }

    // -----------------------------------------------------------------------
    // Distributed TPU mesh tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_create_tpu_mesh() {
        let runtime = test_tpu_runtime(1, 2);
        let options = DistributedMeshOptions {
            name: "tpu_mesh".to_string(),
            device_type: DeviceType::Tpu,
            ..DistributedMeshOptions::new(vec![DimensionSpec::new("batch", 2), DimensionSpec::inferred("model")])
        };
        let mesh = create_distributed_mesh(&runtime, options).unwrap();
        assert_eq!(mesh.name(), "tpu_mesh");
        assert_eq!(mesh.shape(), &[2, 4]);
        assert_eq!(mesh.global_device_ids().iter().copied().collect::<Vec<_>>(), (0..8).rev().collect::<Vec<_>>());
        assert_eq!(mesh.local_device_ids(), &[4, 5, 6, 7]);
        assert_eq!(mesh.device_coordinates(7), Some(vec![0, 0]));
        assert_eq!(mesh.device_type(), &DeviceType::Tpu);
    }

    #[test]
    fn test_create_tpu_mesh_rejects_cluster_arguments() {
        let runtime = test_tpu_runtime(0, 2);
        let tpu_options = |num_global_devices, num_clients, client_id| DistributedMeshOptions {
            num_global_devices,
            num_clients,
            client_id,
            device_type: DeviceType::Tpu,
            ..DistributedMeshOptions::new(vec![DimensionSpec::inferred("x")])
        };
        for (options, argument) in [
            (tpu_options(Some(8), None, None), "num_global_devices"),
            (tpu_options(None, Some(2), None), "num_clients"),
            (tpu_options(None, None, Some(0)), "client_id"),
            (tpu_options(Some(8), Some(2), Some(0)), "num_global_devices"),
        ] {
            assert_eq!(
                create_distributed_mesh(&runtime, options),
                Err(MeshError::TpuArgumentNotAllowed { argument: argument.to_string() }),
            );
        }
    }

    #[test]
    fn test_create_tpu_mesh_without_tpu_topology() {
        let runtime = test_cpu_runtime(0, 1, 4).with_devices(DeviceType::Tpu, 4);
        let options = DistributedMeshOptions {
            device_type: DeviceType::Tpu,
            ..DistributedMeshOptions::new(vec![DimensionSpec::inferred("x")])
        };
        assert_eq!(create_distributed_mesh(&runtime, options), Err(MeshError::TpuTopologyUnavailable));
    }

    #[test]
    fn test_create_tpu_mesh_with_mismatched_device_assignment() {
        let assignment = TpuDeviceAssignment {
            global_device_ids: (0..3).collect(),
            local_device_ids: vec![0],
            local_devices: vec![DeviceSpec::local(DeviceType::Tpu, 0)],
        };
        let runtime = test_cpu_runtime(0, 1, 1)
            .with_devices(DeviceType::Tpu, 4)
            .with_tpu_topology(Arc::new(FixedTpuTopology(Ok(assignment))));
        let options = DistributedMeshOptions {
            device_type: DeviceType::Tpu,
            ..DistributedMeshOptions::new(vec![DimensionSpec::inferred("x")])
        };
        assert_eq!(
            create_distributed_mesh(&runtime, options),
            Err(MeshError::ShapeMismatch { shape: vec![4], device_count: 3 }),
        );
    }

    #[test]
    fn test_create_tpu_mesh_with_failing_tpu_topology() {
        let error = Error::tpu_topology("the TPU system is not initialized");
        let runtime = test_cpu_runtime(0, 1, 1)
            .with_devices(DeviceType::Tpu, 4)
            .with_tpu_topology(Arc::new(FixedTpuTopology(Err(error.clone()))));
        let options = DistributedMeshOptions {
            device_type: DeviceType::Tpu,
            ..DistributedMeshOptions::new(vec![DimensionSpec::inferred("x")])
        };
        assert_eq!(create_distributed_mesh(&runtime, options), Err(MeshError::Runtime(error)));
    }

    #[test]
    fn test_create_distributed_mesh_with_invalid_job_name() {
        let cluster = ClusterConfig { job_name: "train,eval".to_string(), ..ClusterConfig::new(0, 1) };
        let runtime = LocalRuntime::new(cluster).with_devices(DeviceType::Cpu, 2);
        let options = DistributedMeshOptions::new(vec![DimensionSpec::inferred("x")]);
        assert!(matches!(
            create_distributed_mesh(&runtime, options),
            Err(MeshError::Runtime(Error::InvalidDeviceSpec { reason, .. }))
                if reason == "invalid job name 'train,eval'",
        ));
    }
}
