use std::sync::Arc;

use mockapi_core::{ProfileRegistry, ResponseResolver};

#[derive(Clone, Debug)]
pub struct AppState {
    registry: Arc<ProfileRegistry>,
    resolver: Arc<ResponseResolver>,
}

impl AppState {
    pub fn new(registry: ProfileRegistry, resolver: ResponseResolver) -> Self {
        Self {
            registry: Arc::new(registry),
            resolver: Arc::new(resolver),
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ResponseResolver {
        &self.resolver
    }
}
