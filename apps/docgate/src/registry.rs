use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::dispatcher::DispatchError;
use crate::services::{
    GatewayService, ServiceContext, admin, auth, documents, embed, openai, system_settings,
    user_management, workspace, workspace_thread,
};

type BuildFn = dyn Fn(&ServiceContext) -> Arc<dyn GatewayService> + Send + Sync;

/// How to construct one named service, plus the methods it answers to.
#[derive(Clone)]
pub struct ServiceFactory {
    methods: &'static [&'static str],
    build: Arc<BuildFn>,
}

impl ServiceFactory {
    pub fn new<F>(methods: &'static [&'static str], build: F) -> Self
    where
        F: Fn(&ServiceContext) -> Arc<dyn GatewayService> + Send + Sync + 'static,
    {
        Self {
            methods,
            build: Arc::new(build),
        }
    }

    pub fn methods(&self) -> &'static [&'static str] {
        self.methods
    }
}

/// Name-keyed registry of lazily constructed, process-wide service instances.
///
/// Lookup and construction share one critical section, so concurrent first
/// resolutions of the same name build a single instance.
pub struct ServiceRegistry {
    context: ServiceContext,
    factories: HashMap<&'static str, ServiceFactory>,
    instances: Mutex<HashMap<String, Arc<dyn GatewayService>>>,
}

impl ServiceRegistry {
    pub fn empty(context: ServiceContext) -> Self {
        Self {
            context,
            factories: HashMap::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_builtin_services(context: ServiceContext) -> Self {
        Self::empty(context)
            .with_factory(
                "admin",
                ServiceFactory::new(admin::METHODS, |context| {
                    Arc::new(admin::AdminService::new(context.clone()))
                }),
            )
            .with_factory(
                "auth",
                ServiceFactory::new(auth::METHODS, |context| {
                    Arc::new(auth::AuthService::new(context.clone()))
                }),
            )
            .with_factory(
                "documents",
                ServiceFactory::new(documents::METHODS, |context| {
                    Arc::new(documents::DocumentsService::new(context.clone()))
                }),
            )
            .with_factory(
                "embed",
                ServiceFactory::new(embed::METHODS, |context| {
                    Arc::new(embed::EmbedService::new(context.clone()))
                }),
            )
            .with_factory(
                "openai",
                ServiceFactory::new(openai::METHODS, |context| {
                    Arc::new(openai::OpenAiService::new(context.clone()))
                }),
            )
            .with_factory(
                "systemsettings",
                ServiceFactory::new(system_settings::METHODS, |context| {
                    Arc::new(system_settings::SystemSettingsService::new(context.clone()))
                }),
            )
            .with_factory(
                "usermanagement",
                ServiceFactory::new(user_management::METHODS, |context| {
                    Arc::new(user_management::UserManagementService::new(context.clone()))
                }),
            )
            .with_factory(
                "workspace",
                ServiceFactory::new(workspace::METHODS, |context| {
                    Arc::new(workspace::WorkspaceService::new(context.clone()))
                }),
            )
            .with_factory(
                "workspacethread",
                ServiceFactory::new(workspace_thread::METHODS, |context| {
                    Arc::new(workspace_thread::WorkspaceThreadService::new(context.clone()))
                }),
            )
    }

    #[must_use]
    pub fn with_factory(mut self, name: &'static str, factory: ServiceFactory) -> Self {
        self.factories.insert(name, factory);
        self
    }

    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn GatewayService>, DispatchError> {
        let mut instances = self.instances.lock().await;
        if let Some(instance) = instances.get(name) {
            return Ok(Arc::clone(instance));
        }

        let Some(factory) = self.factories.get(name) else {
            warn!(service = name, "unknown gateway service");
            return Err(DispatchError::ServiceNotFound(name.to_string()));
        };

        let instance = (factory.build)(&self.context);
        instances.insert(name.to_string(), Arc::clone(&instance));
        info!(service = name, "service instantiated");
        Ok(instance)
    }

    pub async fn loaded_services(&self) -> Vec<String> {
        let instances = self.instances.lock().await;
        let mut names: Vec<String> = instances.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops every cached instance; the next resolution constructs afresh.
    pub async fn reset(&self) {
        self.instances.lock().await.clear();
    }

    /// Service name to sorted method names, for every registered factory.
    pub fn catalogue(&self) -> BTreeMap<&'static str, Vec<&'static str>> {
        self.factories
            .iter()
            .map(|(name, factory)| {
                let mut methods = factory.methods().to_vec();
                methods.sort_unstable();
                (*name, methods)
            })
            .collect()
    }
}
