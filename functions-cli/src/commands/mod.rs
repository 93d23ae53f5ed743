pub mod config_cmd;
pub mod event_types;
pub mod functions;
pub mod lifecycle;
pub mod logs;

use functions_core::config::Config;

use crate::failure::Failure;

/// Splits a function name argument into `(project, location, short)`. Accepts either a
/// fully-qualified `projects/{p}/locations/{l}/functions/{short}` name or a bare short
/// name, in which case `--project`/`--location` (or their configured defaults, §6) fill
/// in the rest — mirroring how `gcloud`-style CLIs let most commands take a short name
/// once a default project/region is configured.
pub fn resolve_name(
    config: &Config,
    name: &str,
    project: Option<&str>,
    location: Option<&str>,
) -> Result<(String, String, String), Failure> {
    if name.contains('/') {
        let parsed = functions_core::name::parse_name(name)?;
        return Ok((parsed.project, parsed.location, parsed.short));
    }
    let project = project
        .map(str::to_owned)
        .or_else(|| config.project_id().map(str::to_owned))
        .ok_or_else(|| Failure::Validation("no project configured; pass --project or run 'functions config set projectId <id>'".to_owned()))?;
    let location = location.map(str::to_owned).unwrap_or_else(|| config.region());
    functions_core::name::validate_short_name(name)?;
    Ok((project, location, name.to_owned()))
}
