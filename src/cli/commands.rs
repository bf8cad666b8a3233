use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use crate::application::{Application, DEFAULT_RULE};
use crate::config::AppConfig;
use crate::module::ModuleCatalog;
use crate::request::{Request, REQUEST_ID_HEADER};

/// Command-line interface for brrtmvc
#[derive(Parser)]
#[command(name = "brrtmvc")]
#[command(about = "Inspect brrtmvc routing tables", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the configured rules, highest priority first
    Routes {
        /// Application configuration (YAML)
        #[arg(short, long, env = "BRRTMVC_CONFIG")]
        config: PathBuf,
    },
    /// Route a URL and print module, controller, action and params
    Route {
        #[arg(short, long, env = "BRRTMVC_CONFIG")]
        config: PathBuf,

        /// Absolute or relative URL, query string included
        url: String,

        /// POST parameter as key=value (repeatable)
        #[arg(long = "post", value_parser = parse_key_val)]
        post: Vec<(String, String)>,

        /// ULID to carry as the request id
        #[arg(long)]
        request_id: Option<String>,
    },
    /// Build the URL of a target with a named rule
    Unroute {
        #[arg(short, long, env = "BRRTMVC_CONFIG")]
        config: PathBuf,

        /// Rule to encode with
        #[arg(long, default_value = DEFAULT_RULE)]
        rule: String,

        #[arg(long)]
        module: Option<String>,

        #[arg(long)]
        controller: Option<String>,

        #[arg(long)]
        action: Option<String>,

        /// Parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn load_application(config: &Path) -> anyhow::Result<Application> {
    let mut config = AppConfig::load(config)?;
    config.apply_env();
    config.into_application(ModuleCatalog::new())
}

/// Rule names in the order they are tried.
pub fn routes_report(app: &Application) -> Value {
    let names: Vec<&str> = app
        .router()
        .as_rule_based()
        .map(|router| router.rule_names().collect())
        .unwrap_or_default();
    json!({ "application": app.name(), "rules": names })
}

/// The target `url` routes to, as `{request_id, module, controller, action, params}`.
pub fn route_report(
    app: &Application,
    url: &str,
    post: &[(String, String)],
    request_id: Option<&str>,
) -> Value {
    let mut request = Request::from_url(url);
    if let Some(id) = request_id {
        request.set_header(REQUEST_ID_HEADER, id);
    }
    if !app.base_path().is_empty() {
        request.set_base_path(app.base_path());
    }
    for (key, value) in post {
        request.set_post_param(key.as_str(), value.as_str());
    }

    let routed = app.router().route(app, request);
    json!({
        "request_id": routed.id(),
        "module": routed.module(),
        "controller": routed.controller(),
        "action": routed.action(),
        "params": routed.params(),
    })
}

/// The URL `rule` builds for the given target.
pub fn unroute_report(
    app: &Application,
    rule: &str,
    target: [Option<&str>; 3],
    params: &[(String, String)],
) -> Value {
    let mut request = Request::new();
    if !app.base_path().is_empty() {
        request.set_base_path(app.base_path());
    }
    let [module, controller, action] = target;
    request.set_module(module.map(str::to_string));
    request.set_controller(controller.map(str::to_string));
    request.set_action(action.map(str::to_string));
    request.set_get_params(params.iter().cloned());

    let unrouted = app.unroute(request, rule);
    json!({ "rule": rule, "url": unrouted.url() })
}

pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let report = match &cli.command {
        Commands::Routes { config } => routes_report(&load_application(config)?),
        Commands::Route {
            config,
            url,
            post,
            request_id,
        } => route_report(&load_application(config)?, url, post, request_id.as_deref()),
        Commands::Unroute {
            config,
            rule,
            module,
            controller,
            action,
            params,
        } => unroute_report(
            &load_application(config)?,
            rule,
            [module.as_deref(), controller.as_deref(), action.as_deref()],
            params,
        ),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
