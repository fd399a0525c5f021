use std::fmt::{Display, Formatter};

use tracing::info;

use dtmesh_runtime::{ClientId, DeviceType};

use crate::Mesh;

/// Summary of a newly created [`Mesh`] from the point of view of the client that created it.
///
/// Mesh builders log this summary for every mesh they return, which makes it easy to check from the logs of each
/// client of a cluster that all clients agree on the global mesh and that each one picked the right local devices.
#[derive(Clone, Debug)]
pub struct MeshContext<'m> {
    /// ID of the client that created the mesh.
    pub client_id: ClientId,

    /// Number of clients in the cluster.
    pub num_clients: usize,

    /// Type of the devices that the mesh is built over.
    pub device_type: &'m DeviceType,

    /// Number of devices across all clients.
    pub num_global_devices: usize,

    /// The newly created mesh.
    pub mesh: &'m Mesh,
}

impl MeshContext<'_> {
    /// Emits this context as an `info`-level [`tracing`] event.
    pub fn log(&self) {
        info!(
            mesh_name = self.mesh.name(),
            client_id = self.client_id,
            num_clients = self.num_clients,
            device_type = %self.device_type,
            num_global_devices = self.num_global_devices,
            shape = ?self.mesh.shape(),
            global_device_ids = ?self.mesh.global_device_ids().iter().collect::<Vec<_>>(),
            local_device_ids = ?self.mesh.local_device_ids(),
            local_devices = %join(self.mesh.local_devices().iter()),
            "created mesh",
        );
    }
}

impl Display for MeshContext<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(formatter, "client: {} of {}", self.client_id, self.num_clients)?;
        writeln!(formatter, "global {} devices: {}", self.device_type, self.num_global_devices)?;
        writeln!(
            formatter,
            "global device ids: [{}] (shape {:?})",
            join(self.mesh.global_device_ids().iter()),
            self.mesh.shape(),
        )?;
        writeln!(formatter, "local device ids: [{}]", join(self.mesh.local_device_ids().iter()))?;
        write!(formatter, "local devices: [{}]", join(self.mesh.local_devices().iter()))
    }
}

fn join<T: Display, I: Iterator<Item = T>>(values: I) -> String {
    values.map(|value| value.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use dtmesh_runtime::{DeviceSpec, DeviceType};

    use crate::{Mesh, MeshContext, device_id_grid};

    #[test]
    fn test_mesh_context_display() {
        let devices = (0..2).map(|index| DeviceSpec::new("worker", 0, 1, DeviceType::Gpu, index)).collect();
        let global_device_ids = device_id_grid(4, &[2, 2]).unwrap();
        let mesh = Mesh::new("mesh", vec!["batch", "model"], global_device_ids, vec![2, 3], devices).unwrap();
        let context = MeshContext {
            client_id: 1,
            num_clients: 2,
            device_type: mesh.device_type(),
            num_global_devices: 4,
            mesh: &mesh,
        };
        assert_eq!(
            context.to_string(),
            indoc! {"
                client: 1 of 2
                global GPU devices: 4
                global device ids: [0, 1, 2, 3] (shape [2, 2])
                local device ids: [2, 3]
                local devices: [/job:worker/replica:0/task:1/device:GPU:0, /job:worker/replica:0/task:1/device:GPU:1]"},
        );
        context.log();
    }
}
