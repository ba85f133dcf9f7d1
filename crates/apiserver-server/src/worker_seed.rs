use apiserver_common::types::WorkerPayload;
use apiserver_storage::WorkerStore;

/// Workers present on every fresh database.
struct SeedWorkerDef {
    username: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    city: &'static str,
    division: &'static str,
    position: &'static str,
    salary: i64,
}

const DEFAULT_WORKERS: &[SeedWorkerDef] = &[
    SeedWorkerDef {
        username: "masud",
        first_name: "Masudur",
        last_name: "Rahman",
        city: "Madaripur",
        division: "Dhaka",
        position: "Software Engineer",
        salary: 55,
    },
    SeedWorkerDef {
        username: "fahim",
        first_name: "Fahim",
        last_name: "Abrar",
        city: "Chittagong",
        division: "Chittagong",
        position: "Software Engineer",
        salary: 55,
    },
    SeedWorkerDef {
        username: "tahsin",
        first_name: "Tahsin",
        last_name: "Rahman",
        city: "Chittagong",
        division: "Chittagong",
        position: "Software Engineer",
        salary: 55,
    },
    SeedWorkerDef {
        username: "jenny",
        first_name: "Jannatul",
        last_name: "Ferdows",
        city: "Chittagong",
        division: "Chittagong",
        position: "Software Engineer",
        salary: 55,
    },
];

pub fn default_workers() -> Vec<WorkerPayload> {
    DEFAULT_WORKERS
        .iter()
        .map(|def| WorkerPayload {
            username: def.username.to_string(),
            first_name: def.first_name.to_string(),
            last_name: def.last_name.to_string(),
            city: def.city.to_string(),
            division: def.division.to_string(),
            position: def.position.to_string(),
            salary: def.salary,
        })
        .collect()
}

/// Inserts the default workers that are not in the database yet.
/// A username that was deleted earlier stays deleted.
pub async fn init_default_workers(store: &WorkerStore) -> anyhow::Result<usize> {
    let inserted = store.seed_workers(&default_workers()).await?;
    if inserted > 0 {
        tracing::info!(count = inserted, "Initialized default workers");
    } else {
        tracing::debug!("Default workers already present");
    }
    Ok(inserted)
}
