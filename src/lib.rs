//! Headless core of the e-Bridge esports performance tracker.
/// Application directory helpers.
pub mod app_dirs;
/// Durable key-value profile storage.
pub mod store;
/// Session snapshot and onboarding stages.
pub mod session;
/// Onboarding transitions and their effects.
pub mod onboarding;
/// Local account registry.
pub mod accounts;
/// Data-file listing, selection and corpus assembly.
pub mod sources;
/// External text-classification client.
pub mod classify;
/// Insight tag generation with heuristic fallback.
pub mod tags;
/// Typed-keyword confirmation for irreversible actions.
pub mod guard;
/// Goal collection management.
pub mod goals;
/// Match log and derived player statistics.
pub mod matches;
/// Stage-gated application facade.
pub mod app;
/// Logging setup for embedding applications.
pub mod logging;

mod http_client;
