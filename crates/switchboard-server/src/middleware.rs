use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use switchboard_types::Role;

/// The authenticated caller's role, stored in request extensions.
#[derive(Clone, Debug)]
pub struct IdentityContext(pub Role);

/// Header naming the caller's role.
pub const ROLE_HEADER: &str = "x-switchboard-role";

/// Middleware resolving the caller's role from `X-Switchboard-Role`.
///
/// Session issuance and verification live outside this service; the
/// header is trusted as already-authenticated context. Requests without a
/// usable role are rejected with 401 before any handler runs.
pub async fn role_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let raw = req
        .headers()
        .get(ROLE_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let role: Role = raw.parse().map_err(|_| StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(IdentityContext(role));

    Ok(next.run(req).await)
}

/// Guard for admin-only handlers.
pub fn require_admin(identity: &IdentityContext) -> Result<(), (StatusCode, String)> {
    if identity.0.is_admin() {
        Ok(())
    } else {
        Err((StatusCode::FORBIDDEN, "admin role required".to_string()))
    }
}
