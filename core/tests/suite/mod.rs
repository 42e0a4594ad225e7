// Aggregates all integration tests as modules.
mod compact;
#[cfg(not(target_os = "windows"))]
mod local_tools;
