pub mod directory;
pub mod estimator;
pub mod lifecycle;
