/// Router Module Index
///
/// Splits routes by access level so the authentication layer is applied
/// per module rather than per handler.

/// Routes accessible without a token.
pub mod public;

/// Routes protected by the `AuthUser` middleware.
pub mod authenticated;
