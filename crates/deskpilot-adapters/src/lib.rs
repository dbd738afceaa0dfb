//! OS action layer for DeskPilot.
//!
//! Everything that touches the desktop lives here:
//!
//! - [`traits::Desktop`] -- the backend seam, with an X11 implementation
//!   ([`desktop::X11Desktop`]) and a recording one ([`desktop::DryRunDesktop`]).
//! - [`browser`] -- browser sub-scripts over the Chrome DevTools Protocol.
//! - [`apps`] -- allowlist, application aliases, window titles, known sites,
//!   feature flags.
//! - [`killswitch`] -- the process-wide panic flag.
//! - [`actions::ActionSurface`] -- the checked entry point used by the HTTP
//!   layer and the plan executor.
//! - [`tools::ActionTools`] -- the tool dispatch table the LLM loop calls.
//! - [`prompt`] -- system prompt and known-site hint for the LLM loop.

pub mod actions;
pub mod apps;
pub mod browser;
pub mod desktop;
pub mod error;
pub mod killswitch;
pub mod prompt;
pub mod tools;
pub mod traits;

pub use actions::{ActionSurface, Screenshot, WindowClick};
pub use apps::{Allowlist, DEFAULT_FOCUS, Feature, FeatureFlags, known_site, resolve_app};
pub use browser::{BrowserAction, BrowserDriver, BrowserStep};
pub use desktop::{DesktopEvent, DryRunDesktop, X11Desktop};
pub use error::{AdapterError, Result};
pub use killswitch::PanicSwitch;
pub use tools::{ActionTools, RequestError, ToolRequest, needs_clipboard};
pub use traits::{Desktop, MouseButton, WindowInfo};
