pub mod assessment;
pub mod career_path;
pub mod evaluation;
pub mod user;
