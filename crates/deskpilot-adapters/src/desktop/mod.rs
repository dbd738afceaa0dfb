//! [`Desktop`](crate::traits::Desktop) backends.

mod dry_run;
mod x11;

pub use dry_run::{DesktopEvent, DryRunDesktop};
pub use x11::{X11Desktop, parse_wmctrl_line, which_exists, xdotool_key};
