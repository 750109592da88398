use config::Config;
use log::*;
use relay::{IngressBridge, LastValueCache, RouterHandle};
use std::sync::{Arc, OnceLock};

pub mod config;
pub mod logging;

// Process-wide relay state. Needs to implement Clone to be able to be passed
// into the axum Router as State; clones share the same cache and router slot.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub cache: Arc<LastValueCache>,
    router: Arc<OnceLock<RouterHandle>>,
}

impl AppState {
    pub fn new(app_config: Config) -> Self {
        Self {
            config: app_config,
            cache: Arc::new(LastValueCache::new()),
            router: Arc::new(OnceLock::new()),
        }
    }

    /// Attach the running Router. Until this happens ingress answers with
    /// service-unavailable. Returns false if a Router was already attached.
    pub fn attach_router(&self, router: RouterHandle) -> bool {
        let attached = self.router.set(router).is_ok();
        if attached {
            info!("Router attached");
        } else {
            warn!("Router already attached, ignoring second attach");
        }
        attached
    }

    pub fn router(&self) -> Option<&RouterHandle> {
        self.router.get()
    }

    pub fn ingress(&self) -> IngressBridge<'_> {
        IngressBridge::new(&self.cache, self.router())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use events::HandlerRegistry;
    use relay::error::ErrorKind;
    use relay::ingress::Submission;
    use relay::Router;

    fn submission() -> Submission {
        Submission {
            message: Some("go".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ingress_is_unavailable_until_router_attached() {
        let app_state = AppState::new(Config::try_parse_from(["relay_rs"]).unwrap());
        let err = app_state.ingress().submit(submission()).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Unavailable);

        let (router, task) = Router::new(HandlerRegistry::new()).spawn();
        assert!(app_state.clone().attach_router(router.clone()));
        assert!(!app_state.attach_router(router));

        assert!(app_state.router().is_some());
        assert!(app_state.ingress().submit(submission()).unwrap().success);

        task.abort();
    }
}
