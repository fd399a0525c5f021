use tracing::debug;

use crate::{ClientId, Error, LOCAL_JOB_NAME, is_valid_name};

/// Environment variable holding the ID of the current client.
pub const CLIENT_ID_ENV_VAR: &str = "DTENSOR_CLIENT_ID";

/// Environment variable holding the number of clients in the cluster.
pub const NUM_CLIENTS_ENV_VAR: &str = "DTENSOR_NUM_CLIENTS";

/// Environment variable holding the name of the job that all clients belong to.
pub const JOB_NAME_ENV_VAR: &str = "DTENSOR_JOB_NAME";

/// Environment variable holding a comma-separated list of client addresses, one per client.
pub const JOBS_ENV_VAR: &str = "DTENSOR_JOBS";

/// Job name used by default for multi-client clusters.
pub const DEFAULT_MULTI_CLIENT_JOB_NAME: &str = "worker";

/// Coordinates of the current client within a (potentially single-client) cluster.
///
/// These are the values that mesh construction falls back to when the caller does not provide them explicitly.
/// They are normally resolved from the process environment using [`ClusterConfig::from_env`], which recognizes:
///
/// | Variable | Meaning | Default |
/// |---|---|---|
/// | `DTENSOR_CLIENT_ID` | ID of the current client | `0` |
/// | `DTENSOR_JOBS` | Comma-separated client addresses | empty |
/// | `DTENSOR_NUM_CLIENTS` | Number of clients | number of `DTENSOR_JOBS` entries, or `1` if there are none |
/// | `DTENSOR_JOB_NAME` | Job name used in device names | `localhost` for one client and `worker` otherwise |
///
/// Job names must match `[A-Za-z][A-Za-z0-9_]*`.
///
/// Note that no cross-field validation happens here (e.g., a client ID that is out of range for the number of
/// clients is accepted). Such inconsistencies are reported by the mesh builders, which also see explicitly provided
/// values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClusterConfig {
    /// ID of the current client.
    pub client_id: ClientId,

    /// Number of clients in the cluster.
    pub num_clients: usize,

    /// Name of the job that all clients belong to.
    pub job_name: String,

    /// Addresses of all clients, indexed by client ID. This may be empty for single-client clusters.
    pub jobs: Vec<String>,
}

impl ClusterConfig {
    /// Creates a [`ClusterConfig`] for a single-client cluster.
    pub fn single_client() -> Self {
        Self { client_id: 0, num_clients: 1, job_name: LOCAL_JOB_NAME.to_string(), jobs: Vec::new() }
    }

    /// Creates a [`ClusterConfig`] for client `client_id` of a cluster with `num_clients` clients, using the default
    /// job name for that number of clients.
    pub fn new(client_id: ClientId, num_clients: usize) -> Self {
        Self { client_id, num_clients, job_name: default_job_name(num_clients).to_string(), jobs: Vec::new() }
    }

    /// Resolves a [`ClusterConfig`] from the environment variables of the current process.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves a [`ClusterConfig`] using `lookup` to read (environment) variables by name. Variables for which
    /// `lookup` returns [`None`] or a blank value are treated as unset.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, Error> {
        let read = |name: &str| lookup(name).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

        let jobs: Vec<String> = read(JOBS_ENV_VAR)
            .map(|jobs| jobs.split(',').map(|job| job.trim().to_string()).filter(|job| !job.is_empty()).collect())
            .unwrap_or_default();
        let client_id = read(CLIENT_ID_ENV_VAR).map(|value| parse_count(CLIENT_ID_ENV_VAR, value)).transpose()?;
        let num_clients = read(NUM_CLIENTS_ENV_VAR).map(|value| parse_count(NUM_CLIENTS_ENV_VAR, value)).transpose()?;
        let num_clients = num_clients.unwrap_or_else(|| jobs.len().max(1));
        let job_name = read(JOB_NAME_ENV_VAR).map(parse_job_name).transpose()?;
        let job_name = job_name.unwrap_or_else(|| default_job_name(num_clients).to_string());
        let config = Self { client_id: client_id.unwrap_or(0), num_clients, job_name, jobs };

        debug!(
            client_id = config.client_id,
            num_clients = config.num_clients,
            job_name = %config.job_name,
            jobs = ?config.jobs,
            "resolved cluster configuration",
        );
        Ok(config)
    }

}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::single_client()
    }
}

fn default_job_name(num_clients: usize) -> &'static str {
    if num_clients > 1 { DEFAULT_MULTI_CLIENT_JOB_NAME } else { LOCAL_JOB_NAME }
}

fn parse_job_name(value: String) -> Result<String, Error> {
    if is_valid_name(value.as_str()) {
        Ok(value)
    } else {
        Err(Error::InvalidEnvironmentVariable {
            name: JOB_NAME_ENV_VAR.to_string(),
            value,
            reason: "job names must match '[A-Za-z][A-Za-z0-9_]*'".to_string(),
        })
    }
}

fn parse_count(name: &str, value: String) -> Result<usize, Error> {
    value.parse::<usize>().map_err(|error| Error::InvalidEnvironmentVariable {
        name: name.to_string(),
        reason: error.to_string(),
        value,
    })
}
