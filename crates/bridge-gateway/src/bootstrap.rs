//! Startup orchestration — §4.9 "once per login". The gateway itself is
//! single-tenant, so this is a single call rather than the teacher's
//! per-channel-connection loop, but the shape (spawn, don't block `main`) is
//! the same.

use std::sync::Arc;

use crate::app::AppState;

pub fn spawn(state: Arc<AppState>) {
    bridge_portals::schedule_bootstrap(
        state.store.clone(),
        state.factory.clone(),
        state.agents.clone(),
        state.login_id.clone(),
    );
}
