//! Listing queries against the engine.
//!
//! Each query asks for a fixed `|`-separated field list and hands the rows to
//! the record constructors in [`crate::types`].  A failing engine call is
//! returned to the caller untouched; short rows never are.

use crate::parse::{parse_rows, split_rows, Parsed};
use crate::runtime::{Engine, EngineError, Podman};
use crate::types::{ContainerRecord, DriverRecord, ImageRecord, PodContainerRecord, PodRecord};

pub const CONTAINER_FORMAT: &str = "{{.ID}}|{{.Names}}|{{.Status}}|{{.Labels}}";
pub const POD_CONTAINER_FORMAT: &str = "{{.ID}}|{{.Names}}|{{.Status}}|{{.CreatedAt}}";
pub const POD_FORMAT: &str = "{{.ID}}|{{.Name}}|{{.Status}}";
pub const IMAGE_FORMAT: &str = "{{.ID}}|{{.Repository}}|{{.Tag}}";
pub const IMAGE_ID_FORMAT: &str = "{{.ImageID}}";
pub const DRIVER_FORMAT: &str = "{{.Name}}|{{.Driver}}";

async fn stdout(
    engine: &dyn Engine,
    podman: &Podman,
    args: &[&str],
) -> Result<String, EngineError> {
    let command = podman.command(args.iter().copied());
    Ok(engine.run(&command).await?.stdout)
}

fn records<T>(rows: Vec<Parsed<T>>) -> Vec<T> {
    rows.into_iter().map(Parsed::into_record).collect()
}

pub async fn containers(
    engine: &dyn Engine,
    podman: &Podman,
) -> Result<Vec<ContainerRecord>, EngineError> {
    let out = stdout(
        engine,
        podman,
        &["container", "ls", "-a", "--format", CONTAINER_FORMAT],
    )
    .await?;
    Ok(records(parse_rows(
        &out,
        ContainerRecord::FIELDS,
        ContainerRecord::from_fields,
    )))
}

pub async fn pod_containers(
    engine: &dyn Engine,
    podman: &Podman,
    pod: &str,
) -> Result<Vec<PodContainerRecord>, EngineError> {
    let filter = format!("pod={pod}");
    let out = stdout(
        engine,
        podman,
        &[
            "ps",
            "-a",
            "--filter",
            filter.as_str(),
            "--format",
            POD_CONTAINER_FORMAT,
        ],
    )
    .await?;
    Ok(records(parse_rows(
        &out,
        PodContainerRecord::FIELDS,
        PodContainerRecord::from_fields,
    )))
}

pub async fn pods(engine: &dyn Engine, podman: &Podman) -> Result<Vec<PodRecord>, EngineError> {
    let out = stdout(engine, podman, &["pod", "ls", "--format", POD_FORMAT]).await?;
    Ok(records(parse_rows(&out, PodRecord::FIELDS, PodRecord::from_fields)))
}

pub async fn images(
    engine: &dyn Engine,
    podman: &Podman,
) -> Result<Vec<ImageRecord>, EngineError> {
    let out = stdout(engine, podman, &["image", "ls", "--format", IMAGE_FORMAT]).await?;
    Ok(records(parse_rows(
        &out,
        ImageRecord::FIELDS,
        ImageRecord::from_fields,
    )))
}

/// Image ids referenced by any container, running or not.
pub async fn container_image_ids(
    engine: &dyn Engine,
    podman: &Podman,
) -> Result<Vec<String>, EngineError> {
    let out = stdout(
        engine,
        podman,
        &["container", "ls", "-a", "--format", IMAGE_ID_FORMAT],
    )
    .await?;
    Ok(split_rows(&out, 1)
        .filter_map(|fields| fields.get(0).map(str::to_string))
        .collect())
}

pub async fn volumes(
    engine: &dyn Engine,
    podman: &Podman,
) -> Result<Vec<DriverRecord>, EngineError> {
    let out = stdout(engine, podman, &["volume", "ls", "--format", DRIVER_FORMAT]).await?;
    Ok(records(parse_rows(
        &out,
        DriverRecord::FIELDS,
        DriverRecord::from_fields,
    )))
}

pub async fn networks(
    engine: &dyn Engine,
    podman: &Podman,
) -> Result<Vec<DriverRecord>, EngineError> {
    let out = stdout(engine, podman, &["network", "ls", "--format", DRIVER_FORMAT]).await?;
    Ok(records(parse_rows(
        &out,
        DriverRecord::FIELDS,
        DriverRecord::from_fields,
    )))
}

/// Human-readable `system df` summary, one entry per non-blank line.
pub async fn disk_usage(
    engine: &dyn Engine,
    podman: &Podman,
) -> Result<Vec<String>, EngineError> {
    let out = stdout(engine, podman, &["system", "df"]).await?;
    Ok(out
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}
