//! Builds a distributed CPU mesh for the current client and prints it.
//!
//! The cluster coordinates are read from the `DTENSOR_*` environment variables, and so this can be run once per
//! client to check that all clients agree on the global mesh:
//!
//! ```text
//! DTENSOR_JOBS=localhost:9000,localhost:9001 DTENSOR_CLIENT_ID=1 RUST_LOG=info \
//!     cargo run --example distributed_mesh -- 4
//! ```

use tracing_subscriber::EnvFilter;

use dtmesh::{DeviceType, DimensionSpec, DistributedMeshOptions, LocalRuntime, MeshError, create_distributed_mesh};

fn main() -> Result<(), MeshError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let num_local_devices = std::env::args().nth(1).and_then(|value| value.parse().ok()).unwrap_or(2);
    let runtime = LocalRuntime::from_env()?.with_devices(DeviceType::Cpu, num_local_devices);
    let options = DistributedMeshOptions {
        name: "example".to_string(),
        ..DistributedMeshOptions::new(vec![DimensionSpec::new("batch", 2), DimensionSpec::inferred("model")])
    };
    let mesh = create_distributed_mesh(&runtime, options)?;
    println!("{mesh}");
    for (device_id, coordinates) in mesh.local_device_ids().iter().zip(mesh.local_device_coordinates()) {
        println!("device {device_id} is at {coordinates:?}");
    }
    Ok(())
}
