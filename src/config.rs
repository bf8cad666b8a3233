//! YAML application configuration.
//!
//! ```yaml
//! name: blog
//! general_module: general
//! base_path: /app
//! routes:
//!   - type: static
//!     name: about
//!     path: about
//!     defaults: { controller: page, action: about }
//!   - type: dynamic
//!     name: post
//!     path: blog/:id
//!     defaults: { module: blog, controller: post, action: read }
//!   - type: regex
//!     name: archive
//!     pattern: 'archive/(\d+)'
//!     format: archive/%d
//!     params: [year]
//!     defaults: { module: blog, controller: archive, action: year }
//! views:
//!   template_dir: templates
//!   theme: dark
//! ```
//!
//! Routes are added in file order, so the last one has the highest priority.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::Application;
use crate::module::{Module, ModuleCatalog};
use crate::plugins::{ControllerHelpers, ErrorHandler, Redirector, ViewFactory};
use crate::router::rules::{BasicQueryStringRule, DynamicRule, RegexRule, StaticRule};
use crate::router::Rule;
use crate::view::{MiniJinjaView, View};

fn default_general_module() -> String {
    "general".to_string()
}

fn default_true() -> bool {
    true
}

fn default_master() -> Option<String> {
    Some("master".to_string())
}

fn default_extension() -> String {
    ".html".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default = "default_general_module")]
    pub general_module: String,
    #[serde(default)]
    pub base_path: String,
    /// Rule declarations, lowest priority first
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Install the `default` rule before the configured routes
    #[serde(default = "default_true")]
    pub default_route: bool,
    #[serde(default)]
    pub views: Option<ViewsConfig>,
    /// Register the [`ErrorHandler`] as `errorHandler`
    #[serde(default = "default_true")]
    pub error_handler: bool,
}

/// One rule declaration, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteConfig {
    Static {
        name: String,
        path: String,
        #[serde(default)]
        defaults: BTreeMap<String, String>,
    },
    Dynamic {
        name: String,
        path: String,
        #[serde(default)]
        defaults: BTreeMap<String, String>,
    },
    Regex {
        name: String,
        pattern: String,
        format: String,
        #[serde(default)]
        defaults: BTreeMap<String, String>,
        /// Capture group names, in group order
        #[serde(default)]
        params: Vec<String>,
    },
    QueryString {
        name: String,
        #[serde(default)]
        path: String,
        #[serde(default)]
        defaults: BTreeMap<String, String>,
    },
}

impl RouteConfig {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            RouteConfig::Static { name, .. }
            | RouteConfig::Dynamic { name, .. }
            | RouteConfig::Regex { name, .. }
            | RouteConfig::QueryString { name, .. } => name,
        }
    }

    /// Build the rule. Fails only for an invalid regex pattern.
    pub fn build(&self) -> anyhow::Result<Box<dyn Rule>> {
        let rule: Box<dyn Rule> = match self {
            RouteConfig::Static { path, defaults, .. } => {
                Box::new(StaticRule::new(path, defaults.clone()))
            }
            RouteConfig::Dynamic { path, defaults, .. } => {
                Box::new(DynamicRule::new(path, defaults.clone()))
            }
            RouteConfig::Regex {
                name,
                pattern,
                format,
                defaults,
                params,
            } => Box::new(
                RegexRule::new(pattern, format, defaults.clone(), params.clone())
                    .with_context(|| format!("Invalid pattern for route '{name}'"))?,
            ),
            RouteConfig::QueryString { path, defaults, .. } => {
                Box::new(BasicQueryStringRule::new(path, defaults.clone()))
            }
        };
        Ok(rule)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewsConfig {
    pub template_dir: PathBuf,
    /// Layout template, `null` renders actions without one
    #[serde(default = "default_master")]
    pub master: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl AppConfig {
    /// Read and parse a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override fields from `BRRTMVC_ENVIRONMENT`, `BRRTMVC_BASE_PATH` and
    /// `BRRTMVC_GENERAL_MODULE`.
    pub fn apply_env(&mut self) {
        if let Ok(environment) = env::var("BRRTMVC_ENVIRONMENT") {
            self.environment = Some(environment);
        }
        if let Ok(base_path) = env::var("BRRTMVC_BASE_PATH") {
            self.base_path = base_path;
        }
        if let Ok(general) = env::var("BRRTMVC_GENERAL_MODULE") {
            self.general_module = general;
        }
    }

    /// Build the configured application over `catalog`.
    ///
    /// The [`Redirector`] and [`ControllerHelpers`] are always
    /// registered. Fails if a route cannot be built.
    pub fn into_application(self, catalog: ModuleCatalog) -> anyhow::Result<Application> {
        let mut app = Application::bare(&self.name, catalog);
        app.set_environment(self.environment.clone());
        app.set_base_path(&self.base_path);
        app.set_general_module_name(&self.general_module);

        if self.default_route {
            app.install_default_rule();
        }
        for route in &self.routes {
            let rule = route.build()?;
            if let Some(router) = app.rules_mut() {
                router.add_boxed_rule(route.name(), rule);
            }
        }

        app.add_plugin(Redirector::new(), Some(Redirector::NAME));
        app.add_plugin(ControllerHelpers::new(), None);
        if self.error_handler {
            app.add_plugin(ErrorHandler::new(), Some(ErrorHandler::NAME));
        }

        if let Some(views) = &self.views {
            let renderer = app.enable_views(views.factory());
            renderer.set_master(views.master.as_deref());
            renderer.set_theme(views.theme.as_deref());
        }

        info!(
            app = %self.name,
            routes = self.routes.len(),
            default_route = self.default_route,
            views = self.views.is_some(),
            "Application configured"
        );
        Ok(app)
    }
}

impl ViewsConfig {
    /// A factory building a [`MiniJinjaView`] per module over
    /// `<template_dir>[/<theme>][/<module>]`.
    #[must_use]
    pub fn factory(&self) -> ViewFactory {
        let template_dir = self.template_dir.clone();
        let extension = self.extension.clone();
        Rc::new(move |module: &Module, theme: Option<&str>| {
            let dirs = MiniJinjaView::search_path(&template_dir, module.name(), theme);
            Rc::new(MiniJinjaView::from_dirs(dirs).with_extension(&extension)) as Rc<dyn View>
        })
    }
}
