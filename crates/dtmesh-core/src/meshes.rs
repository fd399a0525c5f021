//! Mesh descriptors and the device-ID grid arithmetic that they are built from.
//!
//! A [`Mesh`] organizes the devices of a (potentially multi-client) cluster into a named, multi-dimensional grid.
//! Each cell of the grid holds a _global device ID_ and the grid is stored in **row-major order** with respect to the
//! dimension list: for a mesh with dimensions `("batch"=4, "model"=2)`, the device at mesh coordinate `(i, j)` has
//! linear index `i * 2 + j`. In addition to the grid, a mesh records which global device IDs are _local_ to the
//! current client and the [`DeviceSpec`]s that back them.
//!
//! Meshes are usually created through [`create_mesh`](crate::create_mesh) and
//! [`create_distributed_mesh`](crate::create_distributed_mesh), which compute the grid from the size of the cluster.
//! [`Mesh::new`] can be used directly when the grid is already known, and it enforces the same invariants.
//!
//! # String representation
//!
//! Meshes can be converted to and from a compact, single-line string representation:
//!
//! ```text
//! <name>|<dimension>=<size>,...|<global device ids>|<local device ids>|<local devices>
//! ```
//!
//! For example, the second client of a two-client mesh over two CPU devices named `mesh` is rendered as:
//!
//! ```text
//! mesh|x=2|0,1|1|/job:worker/replica:0/task:1/device:CPU:0
//! ```

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ndarray::{ArrayD, Dimension, IxDyn};

use dtmesh_runtime::{DeviceId, DeviceSpec, DeviceType};

use crate::MeshError;

/// Name of the mesh dimension that is used when no dimensions are provided to
/// [`create_mesh`](crate::create_mesh).
pub const DEFAULT_DIMENSION_NAME: &str = "x";

/// Requested mesh dimension: a name together with either a fixed size or a size that is inferred from the number of
/// devices in the mesh.
///
/// At most one dimension of a mesh can have an inferred size. Its size is the number of devices divided by the
/// product of the sizes of all other dimensions, mirroring how `-1` behaves in NumPy's `reshape`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DimensionSpec {
    name: String,
    size: Option<usize>,
}

impl DimensionSpec {
    /// Creates a dimension with a fixed size.
    pub fn new<N: Into<String>>(name: N, size: usize) -> Self {
        Self { name: name.into(), size: Some(size) }
    }

    /// Creates a dimension whose size is inferred from the number of devices in the mesh.
    pub fn inferred<N: Into<String>>(name: N) -> Self {
        Self { name: name.into(), size: None }
    }

    /// Name of this dimension.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Size of this dimension, or [`None`] if it is inferred.
    pub fn size(&self) -> Option<usize> {
        self.size
    }
}

impl<N: Into<String>> From<(N, usize)> for DimensionSpec {
    fn from((name, size): (N, usize)) -> Self {
        Self::new(name, size)
    }
}

/// Named dimension of a [`Mesh`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeshDimension {
    name: String,
    size: usize,
}

impl MeshDimension {
    /// Name of this dimension.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Number of devices along this dimension.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Display for MeshDimension {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}={}", self.name, self.size)
    }
}

/// Resolves the shape of a mesh with the provided `dimensions` over `device_count` devices.
///
/// Fixed sizes are used as they are, and the (at most one) inferred dimension gets whatever size makes the product of
/// all sizes equal to `device_count`. The resulting product must equal `device_count`.
pub fn resolve_shape(dimensions: &[DimensionSpec], device_count: usize) -> Result<Vec<usize>, MeshError> {
    let mut inferred_dimension: Option<(usize, &str)> = None;
    let mut known_device_count = 1usize;
    for (dimension_index, dimension) in dimensions.iter().enumerate() {
        match dimension.size {
            Some(size) => {
                known_device_count = known_device_count.checked_mul(size).ok_or_else(|| MeshError::Overflow {
                    context: "computing the device count of a mesh shape".to_string(),
                })?;
            }
            None => {
                if let Some((_, first)) = inferred_dimension {
                    return Err(MeshError::MultipleInferredDimensions {
                        first: first.to_string(),
                        second: dimension.name.clone(),
                    });
                }
                inferred_dimension = Some((dimension_index, dimension.name.as_str()));
            }
        }
    }

    let mut shape = dimensions.iter().map(|dimension| dimension.size.unwrap_or(0)).collect::<Vec<_>>();
    if let Some((dimension_index, dimension_name)) = inferred_dimension {
        if known_device_count == 0 || device_count % known_device_count != 0 {
            return Err(MeshError::CannotInferDimension {
                dimension_name: dimension_name.to_string(),
                device_count,
                known_device_count,
            });
        }
        shape[dimension_index] = device_count / known_device_count;
    } else if known_device_count != device_count {
        return Err(MeshError::ShapeMismatch { shape, device_count });
    }
    Ok(shape)
}

/// Returns the device IDs `0..device_count` arranged in a row-major grid with the provided `shape`.
pub fn device_id_grid(device_count: usize, shape: &[usize]) -> Result<ArrayD<DeviceId>, MeshError> {
    ArrayD::from_shape_vec(IxDyn(shape), (0..device_count).collect())
        .map_err(|_| MeshError::ShapeMismatch { shape: shape.to_vec(), device_count })
}

/// Logical multi-dimensional grid of devices used for distributed tensor sharding.
///
/// Invariants (checked by [`Mesh::new`]):
///
///   - there is one non-empty, unique dimension name per axis of the global device ID grid, which means that the
///     product of the dimension sizes always equals the number of global devices,
///   - global device IDs are unique,
///   - local device IDs are unique and are a subset of the global device IDs,
///   - there is exactly one (unique) local device per local device ID, and there is at least one of them,
///   - the job and device type names of all local devices are valid (see [`DeviceSpec::validate`]), and
///   - all local devices have the same [`DeviceType`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mesh {
    name: String,
    dimensions: Vec<MeshDimension>,
    global_device_ids: ArrayD<DeviceId>,
    local_device_ids: Vec<DeviceId>,
    local_devices: Vec<DeviceSpec>,
}

impl Mesh {
    /// Creates a new mesh.
    ///
    /// # Parameters
    ///
    ///   - `name`: Name of the mesh. Can be empty.
    ///   - `dimension_names`: Names of the mesh dimensions, one per axis of `global_device_ids`.
    ///   - `global_device_ids`: Grid of global device IDs. Its shape determines the dimension sizes.
    ///   - `local_device_ids`: Global device IDs that are local to the current client.
    ///   - `local_devices`: Devices that back `local_device_ids`, in the same order.
    pub fn new<N: Into<String>, D: Into<String>>(
        name: N,
        dimension_names: Vec<D>,
        global_device_ids: ArrayD<DeviceId>,
        local_device_ids: Vec<DeviceId>,
        local_devices: Vec<DeviceSpec>,
    ) -> Result<Self, MeshError> {
        let name = name.into();
        if !name.is_empty() {
            validate_name(name.as_str())?;
        }

        if dimension_names.len() != global_device_ids.ndim() {
            return Err(MeshError::DimensionCountMismatch {
                dimension_count: dimension_names.len(),
                rank: global_device_ids.ndim(),
            });
        }
        let mut seen_dimension_names = HashSet::with_capacity(dimension_names.len());
        let mut dimensions = Vec::with_capacity(dimension_names.len());
        for (dimension_name, &size) in dimension_names.into_iter().zip(global_device_ids.shape()) {
            let dimension_name = dimension_name.into();
            if dimension_name.is_empty() {
                return Err(MeshError::EmptyDimensionName);
            }
            validate_name(dimension_name.as_str())?;
            if !seen_dimension_names.insert(dimension_name.clone()) {
                return Err(MeshError::DuplicateDimensionName { dimension_name });
            }
            dimensions.push(MeshDimension { name: dimension_name, size });
        }

        let mut global_device_id_set = HashSet::with_capacity(global_device_ids.len());
        for &device_id in global_device_ids.iter() {
            if !global_device_id_set.insert(device_id) {
                return Err(MeshError::DuplicateDeviceId { device_id });
            }
        }
        let mut local_device_id_set = HashSet::with_capacity(local_device_ids.len());
        for &device_id in local_device_ids.iter() {
            if !global_device_id_set.contains(&device_id) {
                return Err(MeshError::UnknownLocalDeviceId { device_id });
            }
            if !local_device_id_set.insert(device_id) {
                return Err(MeshError::DuplicateDeviceId { device_id });
            }
        }

        if local_device_ids.len() != local_devices.len() {
            return Err(MeshError::LocalDeviceCountMismatch {
                local_device_id_count: local_device_ids.len(),
                local_device_count: local_devices.len(),
            });
        }
        let mut local_device_set = HashSet::with_capacity(local_devices.len());
        for device in local_devices.iter() {
            device.validate()?;
            if !local_device_set.insert(device) {
                return Err(MeshError::DuplicateDevice { device: device.to_string() });
            }
        }
        let first_device_type = local_devices.first().map(DeviceSpec::device_type).ok_or(MeshError::NoLocalDevices)?;
        if let Some(device) = local_devices.iter().find(|device| device.device_type() != first_device_type) {
            return Err(MeshError::MixedDeviceTypes {
                first: first_device_type.clone(),
                second: device.device_type().clone(),
            });
        }

        Ok(Self { name, dimensions, global_device_ids, local_device_ids, local_devices })
    }

    /// Name of this mesh.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Dimensions of this mesh, in order.
    pub fn dimensions(&self) -> &[MeshDimension] {
        self.dimensions.as_slice()
    }

    /// Returns the dimension names as a convenience accessor.
    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(MeshDimension::name).collect()
    }

    /// Shape of this mesh (i.e., the dimension sizes).
    pub fn shape(&self) -> &[usize] {
        self.global_device_ids.shape()
    }

    /// Returns the index of the dimension named `dimension_name`, if present.
    pub fn dimension_index<S: AsRef<str>>(&self, dimension_name: S) -> Option<usize> {
        let dimension_name = dimension_name.as_ref();
        self.dimensions.iter().position(|dimension| dimension.name == dimension_name)
    }

    /// Returns the size of the dimension named `dimension_name`, if present.
    pub fn dimension_size<S: AsRef<str>>(&self, dimension_name: S) -> Option<usize> {
        self.dimension_index(dimension_name).map(|dimension_index| self.dimensions[dimension_index].size)
    }

    /// Row-major grid of global device IDs.
    pub fn global_device_ids(&self) -> &ArrayD<DeviceId> {
        &self.global_device_ids
    }

    /// Number of devices across all clients.
    pub fn num_global_devices(&self) -> usize {
        self.global_device_ids.len()
    }

    /// Global device IDs that are local to the current client.
    pub fn local_device_ids(&self) -> &[DeviceId] {
        self.local_device_ids.as_slice()
    }

    /// Devices backing [`Mesh::local_device_ids`], in the same order.
    pub fn local_devices(&self) -> &[DeviceSpec] {
        self.local_devices.as_slice()
    }

    /// Number of devices that are local to the current client.
    pub fn num_local_devices(&self) -> usize {
        self.local_devices.len()
    }

    /// [`DeviceType`] of the devices in this mesh.
    pub fn device_type(&self) -> &DeviceType {
        // Meshes always have at least one local device.
        self.local_devices[0].device_type()
    }

    /// Returns the mesh coordinates of the device with global ID `device_id`, if it belongs to this mesh.
    pub fn device_coordinates(&self, device_id: DeviceId) -> Option<Vec<usize>> {
        self.global_device_ids
            .indexed_iter()
            .find(|(_, id)| **id == device_id)
            .map(|(index, _)| index.slice().to_vec())
    }

    /// Returns the mesh coordinates of all local devices, in the same order as [`Mesh::local_devices`].
    pub fn local_device_coordinates(&self) -> Vec<Vec<usize>> {
        self.local_device_ids.iter().filter_map(|&device_id| self.device_coordinates(device_id)).collect()
    }
}

impl Display for Mesh {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}|{}|{}|{}|{}",
            self.name,
            join(self.dimensions.iter()),
            join(self.global_device_ids.iter()),
            join(self.local_device_ids.iter()),
            join(self.local_devices.iter()),
        )
    }
}

impl FromStr for Mesh {
    type Err = MeshError;

    fn from_str(mesh_string: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| MeshError::InvalidMeshString { mesh_string: mesh_string.to_string(), reason };

        let parts = mesh_string.trim().split('|').collect::<Vec<_>>();
        let [name, dimensions, global_device_ids, local_device_ids, local_devices] = parts.as_slice() else {
            return Err(invalid(format!("expected 5 '|'-separated fields but found {}", parts.len())));
        };

        let mut dimension_names = Vec::new();
        let mut shape = Vec::new();
        for dimension in split_list(*dimensions) {
            let (dimension_name, size) = dimension
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected '<name>=<size>' but found '{dimension}'")))?;
            let size = size
                .parse::<usize>()
                .map_err(|error| invalid(format!("invalid size for mesh dimension '{dimension_name}'; {error}")))?;
            dimension_names.push(dimension_name.to_string());
            shape.push(size);
        }

        let parse_device_ids = |device_ids: &str| {
            split_list(device_ids)
                .map(|device_id| {
                    device_id
                        .parse::<DeviceId>()
                        .map_err(|error| invalid(format!("invalid device id '{device_id}'; {error}")))
                })
                .collect::<Result<Vec<_>, _>>()
        };
        let global_device_ids = parse_device_ids(*global_device_ids)?;
        let device_count = global_device_ids.len();
        let global_device_ids = ArrayD::from_shape_vec(IxDyn(shape.as_slice()), global_device_ids)
            .map_err(|_| MeshError::ShapeMismatch { shape, device_count })?;
        let local_device_ids = parse_device_ids(*local_device_ids)?;
        let local_devices = split_list(*local_devices).map(DeviceSpec::parse).collect::<Result<Vec<_>, _>>()?;

        Self::new(*name, dimension_names, global_device_ids, local_device_ids, local_devices)
    }
}

fn validate_name(name: &str) -> Result<(), MeshError> {
    if name.chars().any(|c| matches!(c, '|' | ',' | '=') || c.is_whitespace()) {
        Err(MeshError::InvalidName { name: name.to_string() })
    } else {
        Ok(())
    }
}

fn join<T: Display, I: Iterator<Item = T>>(values: I) -> String {
    values.map(|value| value.to_string()).collect::<Vec<_>>().join(",")
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|value| !value.is_empty())
}
