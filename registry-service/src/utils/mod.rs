pub mod avatar;
pub mod validation;

pub use avatar::gravatar_url;
pub use validation::ValidatedJson;
