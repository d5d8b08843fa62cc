//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_WECOM_LOGIN: &str = "/auth/wecom/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const GET_AUTH_ME: &str = "/auth/me";

pub const API_ENTITY: &str = "/api/{entity}";
pub const API_ENTITY_ID: &str = "/api/{entity}/{id}";
pub const GET_API_ENTITY_ID_TRANSITIONS: &str = "/api/{entity}/{id}/transitions";
pub const PATCH_API_ENTITY_ID_STATUS: &str = "/api/{entity}/{id}/status";

pub const POST_ADMIN_DIRECTORY_SYNC: &str = "/admin/directory/sync";
