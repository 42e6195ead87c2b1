/// Router Module Index
///
/// Splits the host's routes by access level. The edge gate is applied at the
/// module boundary (see `create_router`), so nothing under `admin` can be
/// mounted without it by accident.

/// Routes reachable without any session (health checks).
pub mod public;

/// The admin section: everything here sits behind the edge gate.
pub mod admin;
