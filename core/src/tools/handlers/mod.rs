mod apply_patch;
mod shell;
mod view_image;

pub use apply_patch::ApplyPatchHandler;
pub use shell::ShellCommandHandler;
pub use shell::ShellCommandToolCallParams;
pub use shell::ShellHandler;
pub use shell::ShellToolCallParams;
pub use view_image::ViewImageHandler;
