pub mod completion;
pub mod missing;
pub mod refresh;
pub mod submit;
pub mod titles;
