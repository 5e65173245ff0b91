#![allow(unreachable_pub)]

xflags::xflags! {
    cmd xtask {
        /// Runs the test suite of every crate, with diagnostics enabled
        cmd test {}
        /// Seeds a throwaway store and lists it back
        cmd demo {}
        /// Runs a code watcher
        cmd watch {}
        /// Runs all configured linters
        cmd fix {}
    }
}
