/// Router Module Index
///
/// Routes are split by access level so authentication is applied once, as a
/// layer over the whole authenticated router.

/// Routes open to anonymous clients.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware.
pub mod authenticated;
