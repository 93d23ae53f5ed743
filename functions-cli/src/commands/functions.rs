//! `deploy | delete | describe | list | call | reset | debug` (§4.7): the resource-level
//! verbs, each dialing [`crate::client::Client`] and printing in the teacher's
//! `print_running`/`print_success`/`print_failure` idiom.

use std::collections::BTreeMap;
use std::time::Duration;

use clap::Args;
use functions_core::config::Config;
use functions_core::model::{SourceLocation, Trigger};
use serde_json::{json, Value};

use crate::client::Client;
use crate::commands::resolve_name;
use crate::failure::Failure;
use crate::util::{print_failure, print_function_table, print_running, print_success};

/// Shared `--project`/`--location` override flags every resource verb accepts, per
/// `resolve_name`'s bare-short-name fallback (§4.7).
#[derive(Args, Debug, Clone)]
pub struct NameArgs {
    /// A bare short name or a fully-qualified `projects/.../functions/...` name.
    pub name: String,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
}

/// `deploy` (§4.1, §4.7): exactly one trigger flag and one source flag are required, the
/// same one-of discipline `Trigger::from_legacy_flags` already enforces.
#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    #[command(flatten)]
    pub name: NameArgs,

    #[arg(long)]
    pub trigger_http: bool,
    #[arg(long, value_name = "BUCKET")]
    pub trigger_bucket: Option<String>,
    #[arg(long, value_name = "TOPIC")]
    pub trigger_topic: Option<String>,
    #[arg(long, value_name = "EVENT_TYPE")]
    pub trigger_event_type: Option<String>,
    #[arg(long, value_name = "RESOURCE")]
    pub trigger_resource: Option<String>,
    #[arg(long, value_name = "SERVICE")]
    pub trigger_service: Option<String>,

    /// A local directory the worker loads the function's code from.
    #[arg(long, value_name = "PATH")]
    pub source: Option<String>,
    /// A `file://` or `https://` archive URL, as an alternative to `--source`.
    #[arg(long, value_name = "URL")]
    pub source_url: Option<String>,

    #[arg(long)]
    pub entry_point: Option<String>,
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Repeatable `KEY=VALUE` environment variable, forwarded to the worker process.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,
}

pub async fn deploy(config: &Config, args: DeployArgs) -> Result<(), Failure> {
    let (project, location, short) = resolve_name(
        config,
        &args.name.name,
        args.name.project.as_deref(),
        args.name.location.as_deref(),
    )?;

    let trigger = Trigger::from_legacy_flags(
        args.trigger_http,
        args.trigger_bucket.as_deref(),
        args.trigger_topic.as_deref(),
        args.trigger_event_type.as_deref(),
        args.trigger_resource.as_deref(),
        args.trigger_service.as_deref(),
    )?;

    let source = match (&args.source, &args.source_url) {
        (Some(path), None) => SourceLocation::LocalPath { path: path.clone() },
        (None, Some(url)) => SourceLocation::ArchiveUrl { url: url.clone() },
        (None, None) => {
            return Err(Failure::Validation(
                "exactly one of --source or --source-url must be specified.".to_owned(),
            ))
        }
        (Some(_), Some(_)) => {
            return Err(Failure::Validation(
                "only one of --source or --source-url may be specified.".to_owned(),
            ))
        }
    };

    let env: BTreeMap<String, String> = args
        .env
        .iter()
        .map(|kv| {
            kv.split_once('=')
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .ok_or_else(|| Failure::Validation(format!("--env '{}' is not KEY=VALUE", kv)))
        })
        .collect::<Result<_, _>>()?;

    let body = json!({
        "shortName": short,
        "trigger": trigger,
        "source": source,
        "entryPoint": args.entry_point,
        "timeoutMs": args.timeout_ms,
        "env": env,
    });

    print_running(&format!("deploying '{}'", short));
    let client = Client::new(config);
    let view = match client.create_function(&project, &location, body).await {
        Ok(view) => view,
        Err(e) => {
            print_failure();
            return Err(e);
        }
    };
    await_operation(&client, config, view).await
}

pub async fn delete(config: &Config, name: NameArgs) -> Result<(), Failure> {
    let (project, location, short) =
        resolve_name(config, &name.name, name.project.as_deref(), name.location.as_deref())?;

    print_running(&format!("deleting '{}'", short));
    let client = Client::new(config);
    let view = match client.delete_function(&project, &location, &short).await {
        Ok(view) => view,
        Err(e) => {
            print_failure();
            return Err(e);
        }
    };
    await_operation(&client, config, view).await
}

/// Shared deploy/delete tail: the create/delete call only returns the *pending*
/// operation, so the terminal outcome still has to be polled (§3 "Operation").
async fn await_operation(
    client: &Client,
    config: &Config,
    view: crate::client::OperationView,
) -> Result<(), Failure> {
    if let Some(error) = view.error {
        print_failure();
        return Err(Failure::Operational(error));
    }
    if view.done {
        print_success();
        return Ok(());
    }

    let deadline = Duration::from_millis(config.control_timeout_ms());
    let completed = match client.wait_for_operation(&view.name, deadline).await {
        Ok(completed) => completed,
        Err(e) => {
            print_failure();
            return Err(e);
        }
    };
    if let Some(error) = completed.error {
        print_failure();
        return Err(Failure::Operational(error));
    }
    print_success();
    Ok(())
}

pub async fn describe(config: &Config, name: NameArgs, json_output: bool) -> Result<(), Failure> {
    let (project, location, short) =
        resolve_name(config, &name.name, name.project.as_deref(), name.location.as_deref())?;
    let client = Client::new(config);
    let function = client.get_function(&project, &location, &short).await?;
    print_function(&function, json_output);
    Ok(())
}

pub async fn list(config: &Config, project: Option<String>, location: Option<String>, page_size: Option<usize>, json_output: bool) -> Result<(), Failure> {
    let project = project
        .or_else(|| config.project_id().map(str::to_owned))
        .ok_or_else(|| Failure::Validation("no project configured; pass --project or run 'functions config set projectId <id>'".to_owned()))?;
    let location = location.unwrap_or_else(|| config.region());

    let client = Client::new(config);
    let functions = client.list_functions(&project, &location, page_size).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&functions).expect("list serialises"));
        return Ok(());
    }

    let rows: Vec<[String; 4]> = functions
        .iter()
        .map(|f| {
            let name = f["name"].as_str().unwrap_or_default();
            let short = name.rsplit('/').next().unwrap_or(name);
            let trigger = &f["trigger"];
            let kind = trigger["kind"].as_str().unwrap_or("http").to_owned();
            let resource = trigger["topic"]
                .as_str()
                .or_else(|| trigger["bucket"].as_str())
                .or_else(|| trigger["resource"].as_str())
                .unwrap_or("-")
                .to_owned();
            let url = client.invocation_url(&project, &location, short);
            [short.to_owned(), kind, resource, url]
        })
        .collect();
    print_function_table(&rows);
    Ok(())
}

fn print_function(function: &Value, _json_output: bool) {
    println!("{}", serde_json::to_string_pretty(function).expect("function serialises"));
}

pub async fn call(
    config: &Config,
    name: NameArgs,
    data: Option<String>,
    resource: Option<String>,
    event_type: Option<String>,
) -> Result<(), Failure> {
    let (project, location, short) =
        resolve_name(config, &name.name, name.project.as_deref(), name.location.as_deref())?;
    let data: Value = match data {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| Failure::Validation(format!("--data is not valid JSON: {}", e)))?,
        None => Value::Null,
    };

    let client = Client::new(config);
    let (status, body) = client.call_function(&project, &location, &short, data, resource, event_type).await?;
    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    if !(200..300).contains(&status) {
        return Err(Failure::Operational(format!("function call returned HTTP {}", status)));
    }
    Ok(())
}

pub async fn reset(config: &Config, name: NameArgs, keep: bool) -> Result<(), Failure> {
    let (project, location, short) =
        resolve_name(config, &name.name, name.project.as_deref(), name.location.as_deref())?;
    print_running(&format!("resetting '{}'", short));
    let client = Client::new(config);
    match client.admin_reset(&project, &location, &short, keep).await {
        Ok(()) => {
            print_success();
            Ok(())
        }
        Err(e) => {
            print_failure();
            Err(e)
        }
    }
}

/// `debug`/`inspect` (§4.7): two names for the same operation in the distilled verb
/// list, kept as one implementation behind both command names (DESIGN.md).
pub async fn debug(config: &Config, name: NameArgs, port: u16) -> Result<(), Failure> {
    let (project, location, short) =
        resolve_name(config, &name.name, name.project.as_deref(), name.location.as_deref())?;
    let client = Client::new(config);
    match client.admin_debug(&project, &location, &short, port).await {
        Ok(()) => {
            println!("Debugger for {} listening on port {}.", short, port);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
