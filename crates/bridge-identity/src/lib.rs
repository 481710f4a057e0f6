pub mod display;
pub mod ids;

pub use ids::{
    agent_ghost_id, agent_model_ghost_id, human_user_id, model_ghost_id, parse_agent_from_ghost_id,
    parse_ghost_id, reconstruct, slug, ParsedIdentity,
};
