// Handler tiers:
// Public (no auth) → Protected (JWT auth, every /api/* route)
pub mod protected;
pub mod public;
