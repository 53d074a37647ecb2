pub use strata_api as api;

#[cfg(feature = "framework")]
pub use strata_framework as framework;

#[cfg(feature = "framework")]
pub use strata_framework::render_stages;

#[cfg(feature = "framework")]
pub use strata_framework::render_stages::render_stages_prelude;

#[cfg(feature = "renderer")]
pub use strata_renderer as renderer;

#[cfg(feature = "plugins")]
pub use strata_plugins as plugins;
