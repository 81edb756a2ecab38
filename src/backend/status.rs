use sysinfo::{ProcessesToUpdate, System};

use crate::model::{ServiceClass, ServiceEntry};

/// Kernel truncates `comm` to this many bytes.
const COMM_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub id: String,
    pub class: ServiceClass,
    pub pids: Vec<u32>,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        !self.pids.is_empty()
    }
}

/// Whether a process called `name` is one of `wanted`, allowing for the
/// kernel's truncated process names.
fn name_matches(name: &str, wanted: &[String]) -> bool {
    wanted.iter().any(|w| {
        name == w || (name.len() == COMM_LEN && w.len() > COMM_LEN && w.starts_with(name))
    })
}

/// Match `(pid, name)` pairs against each service's process names.
pub fn match_processes<'p>(
    services: &[ServiceEntry],
    processes: impl IntoIterator<Item = (u32, &'p str)>,
) -> Vec<ServiceStatus> {
    let mut statuses: Vec<ServiceStatus> = services
        .iter()
        .map(|svc| ServiceStatus {
            id: svc.id.clone(),
            class: svc.class,
            pids: Vec::new(),
        })
        .collect();

    for (pid, name) in processes {
        for (svc, status) in services.iter().zip(statuses.iter_mut()) {
            if name_matches(name, &svc.process_names) {
                status.pids.push(pid);
            }
        }
    }
    for status in &mut statuses {
        status.pids.sort_unstable();
    }
    statuses
}

/// Which configured front-ends appear to be running right now. Purely
/// informational; switching never consults it.
pub fn probe(services: &[ServiceEntry]) -> Vec<ServiceStatus> {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let names: Vec<(u32, String)> = sys
        .processes()
        .iter()
        .map(|(pid, process)| (pid.as_u32(), process.name().to_string_lossy().to_string()))
        .collect();

    match_processes(
        services,
        names.iter().map(|(pid, name)| (*pid, name.as_str())),
    )
}
