//! Optional SIGQUIT diagnostics dump, gated by the `diagnostics`
//! feature. Grounded in
//! `examples/navicore-cem3/crates/runtime/src/diagnostics.rs`'s
//! JVM-style thread-dump-on-`kill -3` pattern, adapted from strand
//! counts to the parallel-task counter in `crate::parallel`.

#[cfg(feature = "diagnostics")]
mod imp {
    use crate::parallel::ACTIVE_TASKS;
    use std::sync::atomic::Ordering;
    use std::sync::Once;

    static SIGNAL_HANDLER_INIT: Once = Once::new();

    /// Install the SIGQUIT handler. Idempotent; safe to call from every
    /// embedding entry point (`joy-embed`'s `joy_create`, `joy-repl`'s
    /// startup) without risk of double registration.
    pub fn install_signal_handler() {
        SIGNAL_HANDLER_INIT.call_once(|| {
            #[cfg(unix)]
            {
                unsafe {
                    let _ = signal_hook::low_level::register(signal_hook::consts::SIGQUIT, dump_diagnostics);
                }
            }
        });
    }

    /// Dump runtime diagnostics to stderr. Callable directly, or
    /// triggered by `kill -3 <pid>` once [`install_signal_handler`] has
    /// run. Output goes to stderr so it never interleaves with a
    /// program's own `put`/`putchars` output.
    pub fn dump_diagnostics() {
        use std::io::Write;
        let mut out = std::io::stderr().lock();
        let _ = writeln!(out, "\n=== Joy Runtime Diagnostics ===");
        let _ = writeln!(out, "Active parallel tasks: {}", ACTIVE_TASKS.load(Ordering::Relaxed));
        let _ = writeln!(out, "=== End Diagnostics ===\n");
    }
}

#[cfg(not(feature = "diagnostics"))]
mod imp {
    pub fn install_signal_handler() {}
    pub fn dump_diagnostics() {}
}

pub use imp::{dump_diagnostics, install_signal_handler};
