mod bearer;

pub use bearer::{BearerAuthFactory, BearerAuthService};
