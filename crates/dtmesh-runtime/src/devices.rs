use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::Error;

/// Type alias used to represent global device IDs. Global device IDs index into the full, cluster-wide set of devices
/// of a mesh and are dense: a mesh over `n` devices uses the IDs `0..n`.
pub type DeviceId = usize;

/// Type alias used to represent client (i.e., task) IDs within a cluster. Clients are numbered `0..num_clients`.
pub type ClientId = usize;

/// Job name used for devices that belong to a single-client (i.e., local) cluster.
pub const LOCAL_JOB_NAME: &str = "localhost";

/// Kind of a [`DeviceSpec`] (e.g., a CPU or a GPU).
///
/// Device type names are case-insensitive. They are normalized to upper case on construction so that, for example,
/// `DeviceType::from("gpu") == DeviceType::Gpu`. Device types that are not known to this crate are preserved in
/// [`DeviceType::Other`], which lets single-client meshes be built over arbitrary logical devices while distributed
/// mesh construction rejects them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeviceType {
    #[default]
    Cpu,
    Gpu,
    Tpu,
    Other(OtherDeviceType),
}

/// Name of a device type that is not CPU, GPU, or TPU.
///
/// Values can only be obtained by converting a name into a [`DeviceType`], and so they are always trimmed and upper
/// case, and never equal to `CPU`, `GPU`, or `TPU`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OtherDeviceType(String);

impl OtherDeviceType {
    /// Upper-case name of this device type.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl DeviceType {
    /// Returns the canonical (upper-case) name of this [`DeviceType`].
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
            Self::Tpu => "TPU",
            Self::Other(name) => name.as_str(),
        }
    }

    /// Returns `true` if this is a CPU or a GPU device type, for which meshes are built from local device arithmetic.
    pub fn is_cpu_or_gpu(&self) -> bool {
        matches!(self, Self::Cpu | Self::Gpu)
    }
}

impl From<&str> for DeviceType {
    fn from(value: &str) -> Self {
        let name = value.trim().to_uppercase();
        match name.as_str() {
            "CPU" => Self::Cpu,
            "GPU" => Self::Gpu,
            "TPU" => Self::Tpu,
            _ => Self::Other(OtherDeviceType(name)),
        }
    }
}

impl From<String> for DeviceType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl Display for DeviceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Fully-qualified reference to a physical device, as seen by the runtime that owns it.
///
/// The canonical string representation of a [`DeviceSpec`] is
/// `/job:<job>/replica:<replica>/task:<task>/device:<type>:<index>`
/// (e.g., `/job:localhost/replica:0/task:0/device:CPU:0`). Device specifications are only ever read, compared, and
/// sliced by mesh construction; the devices themselves are owned by the [`DeviceRuntime`](crate::DeviceRuntime).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceSpec {
    job: String,
    replica: usize,
    task: ClientId,
    device_type: DeviceType,
    index: usize,
}

impl DeviceSpec {
    /// Creates a new [`DeviceSpec`].
    ///
    /// This does not check the job name or the device type name. Use [`DeviceSpec::validate`] for that, which mesh
    /// construction does for every device that it is given.
    pub fn new<J: Into<String>>(job: J, replica: usize, task: ClientId, device_type: DeviceType, index: usize) -> Self {
        Self { job: job.into(), replica, task, device_type, index }
    }

    /// Creates a [`DeviceSpec`] for a device that belongs to the single-client cluster (i.e., job
    /// [`LOCAL_JOB_NAME`], replica `0`, and task `0`).
    pub fn local(device_type: DeviceType, index: usize) -> Self {
        Self::new(LOCAL_JOB_NAME, 0, 0, device_type, index)
    }

    /// Parses a fully-qualified device specification (e.g., `/job:worker/replica:0/task:1/device:GPU:3`).
    pub fn parse<S: AsRef<str>>(spec: S) -> Result<Self, Error> {
        let spec = spec.as_ref();
        let mut job = None;
        let mut replica = None;
        let mut task = None;
        let mut device = None;
        for component in spec.split('/').filter(|component| !component.is_empty()) {
            let (slot_name, already_set) = if let Some(value) = component.strip_prefix("job:") {
                ("job", job.replace(value.to_string()).is_some())
            } else if let Some(value) = component.strip_prefix("replica:") {
                ("replica", replica.replace(parse_index(spec, "replica", value)?).is_some())
            } else if let Some(value) = component.strip_prefix("task:") {
                ("task", task.replace(parse_index(spec, "task", value)?).is_some())
            } else {
                let value = component.strip_prefix("device:").unwrap_or(component);
                ("device", device.replace(parse_device(spec, value)?).is_some())
            };
            if already_set {
                return Err(Error::invalid_device_spec(spec, format!("the {slot_name} is specified more than once")));
            }
        }

        let job = job.filter(|job| !job.is_empty()).ok_or_else(|| Error::invalid_device_spec(spec, "missing job"))?;
        let replica = replica.ok_or_else(|| Error::invalid_device_spec(spec, "missing replica"))?;
        let task = task.ok_or_else(|| Error::invalid_device_spec(spec, "missing task"))?;
        let (device_type, index) = device.ok_or_else(|| Error::invalid_device_spec(spec, "missing device"))?;
        let device = Self { job, replica, task, device_type, index };
        device.validate().map_err(|_| Error::invalid_device_spec(spec, invalid_name_reason(&device)))?;
        Ok(device)
    }

    /// Parses the device part of a specification (e.g., `CPU:0` or `device:GPU:1`) as a device that belongs to the
    /// single-client cluster. This is how user-provided device lists are interpreted for single-client meshes.
    pub fn parse_local<S: AsRef<str>>(spec: S) -> Result<Self, Error> {
        Self::parse(format!("/job:{LOCAL_JOB_NAME}/replica:0/task:0/{}", spec.as_ref()))
    }

    /// Checks that the job name and the device type name of this device are valid names (i.e., that they match
    /// `[A-Za-z][A-Za-z0-9_]*`), which guarantees that the string representation of this device parses back to it.
    pub fn validate(&self) -> Result<(), Error> {
        let is_valid = is_valid_name(self.job.as_str())
            && !matches!(&self.device_type, DeviceType::Other(name) if !is_valid_name(name.as_str()));
        if is_valid { Ok(()) } else { Err(Error::invalid_device_spec(self.to_string(), invalid_name_reason(self))) }
    }

    /// Name of the job that this device belongs to.
    pub fn job(&self) -> &str {
        self.job.as_str()
    }

    /// Replica index of this device.
    pub fn replica(&self) -> usize {
        self.replica
    }

    /// Task index of this device. Tasks correspond one-to-one to mesh clients.
    pub fn task(&self) -> ClientId {
        self.task
    }

    /// [`DeviceType`] of this device.
    pub fn device_type(&self) -> &DeviceType {
        &self.device_type
    }

    /// Index of this device among the devices of the same type in its task.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl FromStr for DeviceSpec {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        Self::parse(spec)
    }
}

impl Display for DeviceSpec {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "/job:{}/replica:{}/task:{}/device:{}:{}",
            self.job, self.replica, self.task, self.device_type, self.index,
        )
    }
}

/// Returns `true` if `name` can be used as a job name or a device type name, i.e., if it matches
/// `[A-Za-z][A-Za-z0-9_]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut characters = name.chars();
    characters.next().is_some_and(|character| character.is_ascii_alphabetic())
        && characters.all(|character| character.is_ascii_alphanumeric() || character == '_')
}

fn invalid_name_reason(device: &DeviceSpec) -> String {
    if is_valid_name(device.job.as_str()) {
        format!("invalid device type '{}'", device.device_type)
    } else {
        format!("invalid job name '{}'", device.job)
    }
}

fn parse_index(spec: &str, field: &str, value: &str) -> Result<usize, Error> {
    value
        .parse::<usize>()
        .map_err(|error| Error::invalid_device_spec(spec, format!("invalid {field} '{value}'; {error}")))
}

fn parse_device(spec: &str, value: &str) -> Result<(DeviceType, usize), Error> {
    let (device_type, index) = value
        .rsplit_once(':')
        .ok_or_else(|| Error::invalid_device_spec(spec, format!("expected '<type>:<index>' but got '{value}'")))?;
    if device_type.is_empty() {
        return Err(Error::invalid_device_spec(spec, "empty device type"));
    }
    Ok((DeviceType::from(device_type), parse_index(spec, "device index", index)?))
}
