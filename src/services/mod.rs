pub mod api;
pub mod dashboard;
pub mod editor;
pub mod export;
pub mod gallery;
pub mod generate;
pub mod models;
pub mod preview;
pub mod wizard;

#[cfg(all(test, not(target_arch = "wasm32")))]
pub mod testing;
