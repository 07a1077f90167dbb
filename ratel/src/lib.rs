//! Ratel
//!
//! Compiles contract sources where some definitions are tagged `@mpc` and
//! belong to an off-chain protocol. The tagged definitions are split out into
//! their own source text; the rest compiles as an ordinary contract.
//!
//! ```no_run
//! use ratel::{RatelCompiler, RatelOptions};
//!
//! let source = "@mpc\nasync def multiply(a, b):\n    return a * b\n";
//! let output = RatelCompiler::new()
//!     .compile(source, &RatelOptions::default().with_output_formats(&["abi"]))
//!     .unwrap();
//! println!("{}", output.secondary_domain["src_code"]);
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod compiler;
pub mod error;
pub mod marker;
pub mod splitter;

pub use compiler::{
    PartitionedClassTypes, RatelCompiler, RatelOptions, RatelOutput, SecondaryFormat,
    SplitArtifacts,
};
pub use error::{RatelError, RatelResult};
pub use marker::{Domain, DomainMarker};
pub use splitter::{split, SplitResult};

#[cfg(test)]
mod tests;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `RUST_LOG`-filtered subscriber for the compiler's spans.
///
/// Does nothing when `RUST_LOG` is unset or a global subscriber already
/// exists. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(EnvFilter::from_default_env())
                .try_init();
        }
    });
}
