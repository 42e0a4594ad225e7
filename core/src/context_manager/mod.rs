mod history;
mod normalize;

pub use history::ContextManager;
