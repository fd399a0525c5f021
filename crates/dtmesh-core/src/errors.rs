use thiserror::Error;

use dtmesh_runtime::{ClientId, DeviceId, DeviceType};

/// Error type for mesh descriptors and mesh construction.
///
/// All of these errors are input-validation errors that are detected synchronously, before any mesh is returned.
/// None of them are transient and so retrying the same call with the same inputs will always fail the same way.
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MeshError {
    /// Error returned when the requested device type conflicts with the type of explicitly provided devices.
    #[error("conflicting devices {devices:?} (of type {inferred}) and device type {requested}")]
    ConflictingDeviceType { requested: DeviceType, inferred: DeviceType, devices: Vec<String> },

    /// Error returned when there are no devices to build a single-client mesh over.
    #[error("no {device_type} devices are available to build a mesh over")]
    NoDevices { device_type: DeviceType },

    /// Error returned when a mesh would have no local devices.
    #[error("meshes must have at least one local device")]
    NoLocalDevices,

    /// Error returned when the global device count is `0`.
    #[error("num_global_devices ({num_global_devices}) must be > 0")]
    InvalidGlobalDeviceCount { num_global_devices: usize },

    /// Error returned when the client count is `0`.
    #[error("num_clients ({num_clients}) must be > 0")]
    InvalidClientCount { num_clients: usize },

    /// Error returned when the client ID is not in `[0, num_clients)`.
    #[error("client_id ({client_id}) must be < {num_clients}")]
    InvalidClientId { client_id: ClientId, num_clients: usize },

    /// Error returned when the global device count is not a multiple of the client count.
    #[error("num_global_devices ({num_global_devices}) must be divisible by num_clients ({num_clients})")]
    IndivisibleDeviceCount { num_global_devices: usize, num_clients: usize },

    /// Error returned when a client needs more local devices than it has available.
    #[error("not enough devices; {needed} needed, only {available} available")]
    NotEnoughDevices { needed: usize, available: usize },

    /// Error returned when a cluster coordinate is provided explicitly for a TPU mesh.
    #[error(
        "do not specify {argument} for TPU meshes; it is filled in automatically from the TPU topology of the cluster"
    )]
    TpuArgumentNotAllowed { argument: String },

    /// Error returned when a TPU mesh is requested from a runtime without a TPU topology.
    #[error("the device runtime does not provide a TPU topology")]
    TpuTopologyUnavailable,

    /// Error returned when a distributed mesh is requested for a device type other than CPU, GPU, or TPU.
    #[error("device type {device_type} is not CPU, GPU, or TPU")]
    UnsupportedDeviceType { device_type: DeviceType },

    /// Error returned when more than one mesh dimension has an inferred size.
    #[error("only one mesh dimension can have an inferred size, but both '{first}' and '{second}' do")]
    MultipleInferredDimensions { first: String, second: String },

    /// Error returned when the size of an inferred dimension cannot be derived from the device count.
    #[error(
        "cannot infer the size of mesh dimension '{dimension_name}'; {device_count} device(s) cannot be split evenly \
         across the {known_device_count} device(s) implied by the other dimensions"
    )]
    CannotInferDimension { dimension_name: String, device_count: usize, known_device_count: usize },

    /// Error returned when the product of the mesh dimension sizes does not match the device count.
    #[error("mesh shape {shape:?} implies a different number of devices than the {device_count} available")]
    ShapeMismatch { shape: Vec<usize>, device_count: usize },

    /// Error returned when arithmetic overflows while computing mesh shapes.
    #[error("overflow while {context}")]
    Overflow { context: String },

    /// Error returned when a mesh dimension name is empty.
    #[error("mesh dimension names must be non-empty")]
    EmptyDimensionName,

    /// Error returned when a mesh dimension or mesh name contains a reserved character.
    #[error("invalid name '{name}'; names cannot contain '|', ',', '=', or whitespace")]
    InvalidName { name: String },

    /// Error returned when mesh dimension names are not unique.
    #[error("mesh dimension '{dimension_name}' appears more than once")]
    DuplicateDimensionName { dimension_name: String },

    /// Error returned when the number of dimension names does not match the rank of the device ID grid.
    #[error("got {dimension_count} mesh dimension name(s) for a device id grid of rank {rank}")]
    DimensionCountMismatch { dimension_count: usize, rank: usize },

    /// Error returned when device IDs in a mesh are not unique.
    #[error("mesh device id {device_id} appears more than once")]
    DuplicateDeviceId { device_id: DeviceId },

    /// Error returned when the same device backs more than one local device ID.
    #[error("device '{device}' appears more than once in the local devices of the mesh")]
    DuplicateDevice { device: String },

    /// Error returned when a local device ID does not appear in the global device ID grid.
    #[error("local device id {device_id} is not one of the global device ids of the mesh")]
    UnknownLocalDeviceId { device_id: DeviceId },

    /// Error returned when the number of local devices does not match the number of local device IDs.
    #[error("mesh has {local_device_id_count} local device id(s), but {local_device_count} local device(s)")]
    LocalDeviceCountMismatch { local_device_id_count: usize, local_device_count: usize },

    /// Error returned when the local devices of a mesh have different device types.
    #[error("all local devices of a mesh must have the same type, but found both {first} and {second}")]
    MixedDeviceTypes { first: DeviceType, second: DeviceType },

    /// Error returned when parsing the string representation of a mesh fails.
    #[error("invalid mesh string '{mesh_string}'; {reason}")]
    InvalidMeshString { mesh_string: String, reason: String },

    #[error(transparent)]
    Runtime(#[from] dtmesh_runtime::Error),
}
