//! HTTP surface of the mock API server.
//!
//! Management endpoints (`/profiles`, `/activeProfile`, `/setActiveProfile`)
//! operate on the profile registry; every other request is answered from the
//! active profile's response files.

mod access_log;
mod api;
mod app_state;
mod bootstrap;
mod responses;
mod router;
mod server;

pub use app_state::AppState;
pub use bootstrap::{
    apply_overrides, build_state, load_server_config, BootstrapError, LoadedConfig,
};
pub use router::{build_router, paths};
pub use server::{MockApiServer, RunningServer};
