pub mod renderer;
pub mod sanitize;
pub mod theme;
